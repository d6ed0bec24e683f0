//! Runtime Configuration
//!
//! Export-folder and port settings, read from the environment with
//! sensible defaults.

use std::env;
use std::path::PathBuf;

/// Configuration for the analytics service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Folder holding the monthly CSV exports
    pub output_dir: PathBuf,
    /// First port handed out by the dashboard orchestrator
    pub base_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { output_dir: PathBuf::from("output"), base_port: 8050 }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: env::var("VIGIA_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            base_port: env::var("VIGIA_BASE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.base_port),
        }
    }
}
