//! Server module for Themis
//!
//! Contains configuration, store initialization and the HTTP run loop.

pub mod config;
pub mod init;
pub mod loader;

pub use config::AppConfig;
pub use init::{init_logger, init_stores, run, StoreBundle};
pub use loader::load_config;
