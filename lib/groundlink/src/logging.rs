//! Structured logging setup shared by every binary in the workspace.
//!
//! Built on `slog`, configured the way an operator would hand-edit a TOML file:
//! `sloggers::LoggerConfig` parsed with `serdeconv`, falling back to a terminal/debug
//! default when no config file is supplied.

pub use slog::{debug, error, info, o, trace, warn, Logger};

use sloggers::{Config, LoggerConfig};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#;

/// Builds the root logger from an optional TOML config file. Falls back to a terminal,
/// stderr, debug-level logger if `path` is `None` or does not exist.
pub fn init(path: Option<&Path>) -> Logger {
    let raw = path
        .filter(|p| p.exists())
        .and_then(|p| std::fs::read_to_string(p).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let config: LoggerConfig =
        serdeconv::from_toml_str(&raw).unwrap_or_else(|_| serdeconv::from_toml_str(DEFAULT_CONFIG).unwrap());

    config.build_logger().expect("failed to build logger from config")
}

/// Convenience used by tests and small helper binaries that don't want to touch a config file.
pub fn init_default() -> Logger {
    init(None)
}
