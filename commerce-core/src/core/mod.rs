//! Engine infrastructure: configuration, logging, locks and wiring

pub mod config;
pub mod locks;
pub mod logger;
pub mod state;
