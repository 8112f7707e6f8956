//! API module
//!
//! Contains HTTP request handlers for WOOP runs and generation settings

pub mod settings;
pub mod woop;
