//! Core pipeline for turning noisy OCR'd broadcast overlays into structured,
//! de-duplicated tip events tied to a two-session-per-day schedule.

pub mod config;
pub mod db;
pub mod extraction;
pub mod models;
pub mod monitor;
pub mod persistence;
pub mod schedule;
pub mod tracking;
