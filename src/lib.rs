//! EmoGo backend — mood-tracking data collection over a fail-open storage facade.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
