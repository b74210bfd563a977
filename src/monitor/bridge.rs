use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use super::automation::{AutomationError, FrameText, Platform, StreamAutomation};

/// Drives the external capture helper (browser + OCR glue) as a child
/// process speaking one JSON object per line over stdio. The helper owns the
/// browser, the screenshots, and the OCR engine; this side only sees text.
pub struct HelperAutomation {
    command: Vec<String>,
    platform: Platform,
    channel_url: String,
    child: Option<HelperChild>,
}

struct HelperChild {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[derive(Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum HelperRequest<'a> {
    Start {
        platform: &'a str,
        url: &'a str,
        top_crop: [u32; 4],
        bottom_crop: [u32; 4],
    },
    Probe,
    Frame,
    Stop,
}

impl HelperAutomation {
    pub fn new(command: Vec<String>, platform: Platform, channel_url: String) -> Self {
        Self {
            command,
            platform,
            channel_url,
            child: None,
        }
    }

    fn roundtrip(&mut self, request: &HelperRequest<'_>) -> Result<Value, AutomationError> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| AutomationError::Transport("capture helper not running".into()))?;

        let line = serde_json::to_string(request)
            .map_err(|err| AutomationError::Protocol(err.to_string()))?;
        debug!("helper <- {line}");
        writeln!(child.stdin, "{line}")
            .map_err(|err| AutomationError::Transport(format!("helper stdin closed: {err}")))?;

        let mut reply = String::new();
        let read = child
            .stdout
            .read_line(&mut reply)
            .map_err(|err| AutomationError::Transport(format!("helper stdout failed: {err}")))?;
        if read == 0 {
            // Helper exited underneath us; the browser process is gone.
            return Err(AutomationError::SessionEnded);
        }
        debug!("helper -> {}", reply.trim_end());

        let value: Value = serde_json::from_str(reply.trim_end())
            .map_err(|err| AutomationError::Protocol(format!("unparseable reply: {err}")))?;

        if value.get("event").and_then(Value::as_str) == Some("ended") {
            return Err(AutomationError::SessionEnded);
        }
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(AutomationError::Transport(message.to_string()));
        }
        Ok(value)
    }
}

impl StreamAutomation for HelperAutomation {
    fn acquire(&mut self) -> Result<(), AutomationError> {
        if self.child.is_some() {
            return Ok(());
        }
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| AutomationError::Transport("helper command not configured".into()))?;

        info!("Launching capture helper: {program}");
        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| AutomationError::Transport("helper stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| AutomationError::Transport("helper stdout unavailable".into()))?;

        self.child = Some(HelperChild {
            process,
            stdin,
            stdout,
        });

        let (top_crop, bottom_crop) = self.platform.crop_regions();
        let url = self.channel_url.clone();
        let start = HelperRequest::Start {
            platform: self.platform.as_str(),
            url: &url,
            top_crop,
            bottom_crop,
        };
        let reply = self.roundtrip(&start).map_err(|err| {
            self.release();
            err
        })?;
        if reply.get("ok").and_then(Value::as_bool) != Some(true) {
            self.release();
            return Err(AutomationError::Protocol(format!(
                "helper rejected start: {reply}"
            )));
        }
        Ok(())
    }

    fn probe_online(&mut self) -> Result<bool, AutomationError> {
        let reply = self.roundtrip(&HelperRequest::Probe)?;
        reply
            .get("online")
            .and_then(Value::as_bool)
            .ok_or_else(|| AutomationError::Protocol(format!("probe reply missing 'online': {reply}")))
    }

    fn capture_frame(&mut self) -> Result<FrameText, AutomationError> {
        let reply = self.roundtrip(&HelperRequest::Frame)?;
        serde_json::from_value(reply)
            .map_err(|err| AutomationError::Protocol(format!("bad frame reply: {err}")))
    }

    fn release(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // Ask nicely first so the helper can close its browser, then reap.
        if let Ok(stop) = serde_json::to_string(&HelperRequest::Stop) {
            let _ = writeln!(child.stdin, "{stop}");
        }
        drop(child.stdin);
        match child.process.wait() {
            Ok(status) => debug!("capture helper exited with {status}"),
            Err(err) => {
                warn!("capture helper did not exit cleanly ({err}); killing");
                let _ = child.process.kill();
                let _ = child.process.wait();
            }
        }
    }
}

impl Drop for HelperAutomation {
    fn drop(&mut self) {
        self.release();
    }
}
