//! Library exports for the quickfind binary and integration tests.
/// Application directory helpers.
pub mod app_dirs;
/// Configuration loading and validation.
pub mod config;
/// Human-readable size and time formatting.
pub mod format;
/// Persisted file index backed by SQLite.
pub mod index;
/// Logging setup.
pub mod logging;
/// Incremental filesystem synchronization engine.
pub mod monitor;
