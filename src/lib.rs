//! Vehicle access control.
//!
//! A camera feed is sampled periodically, plates read by an external ALPR
//! program are checked against a whitelist and every admitted vehicle is
//! recorded in the access log. Residents register through a Telegram bot;
//! an operator reviews those requests and imports them into the whitelist.

pub mod auth;
pub mod bot;
pub mod camera;
pub mod config;
pub mod db;
pub mod import;
pub mod intake;
pub mod recognition;
pub mod staging;
pub mod web;

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber. Unknown level names fall back to INFO.
pub fn init_logging(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    FmtSubscriber::builder().with_max_level(level).init();
}
