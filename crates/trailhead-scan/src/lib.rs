//! # Trailhead Scan
//!
//! This crate provides the scanning core for the John Muir Trail permit
//! tracker. It handles the typed upstream records, the availability
//! computation over the joint entry/exit quota pools, deterministic report
//! rendering, the change/notify decision, and the authenticated client for
//! the wilderness trailhead report it all feeds from.

/// Types for trailhead scan operations
mod scan_types;
pub use scan_types::*;

/// Search window derivation and capacity computation
mod availability;
pub use availability::*;

/// Deterministic text rendering of scan results
mod report;
pub use report::*;

/// Change detection and the notify-or-not decision
mod decision;
pub use decision::*;

/// Retry policy for calls against flaky upstream services
mod retry;
pub use retry::*;

/// Cookie-backed session management and captcha authentication
mod session_manager;
pub use session_manager::*;

/// Client for the Anti-Captcha solver API
mod captcha_client;
pub use captcha_client::*;

/// Client for the wilderness trailhead report endpoints
mod wild_trails_client;
pub use wild_trails_client::*;
