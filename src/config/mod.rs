//! Configuration module for the reading aid.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the provider,
//! audio output and reading session, `AppPaths` for cross-platform data
//! directories, and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, ProviderConfig, ReadingConfig};
