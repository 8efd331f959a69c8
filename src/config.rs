//! Configuration for the `kfb-inspect` tool.
//!
//! Options come from command-line arguments via clap, with environment
//! variable fallbacks using the `KFB_` prefix.
//!
//! # Environment Variables
//!
//! - `KFB_LIBRARY_PATH` - Vendor shared object (default: lib/libImageOperationLib.so)
//! - `KFB_OUTPUT_FORMAT` - `text` or `json` (default: text)
//! - `KFB_DOWNSAMPLES` - Comma-separated downsample factors to resolve to levels

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

// =============================================================================
// Default Values
// =============================================================================

/// Default location of the vendor library.
pub const DEFAULT_LIBRARY_PATH: &str = "lib/libImageOperationLib.so";

/// Default downsample factors resolved in the report.
pub const DEFAULT_DOWNSAMPLES: &str = "1,4,16,32";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Output format for slide reports.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// kfb-inspect - Print metadata of a KFB whole slide image.
///
/// Opens the slide through the vendor library and reports properties,
/// synthesized levels and associated images. Nothing is written to disk.
#[derive(Parser, Debug, Clone)]
#[command(name = "kfb-inspect")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path to the slide file.
    pub slide: PathBuf,

    /// Path to the vendor shared object.
    #[arg(long, default_value = DEFAULT_LIBRARY_PATH, env = "KFB_LIBRARY_PATH")]
    pub library: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "KFB_OUTPUT_FORMAT")]
    pub format: OutputFormat,

    /// Downsample factors to resolve to the best level (comma-separated).
    #[arg(
        long,
        value_delimiter = ',',
        default_value = DEFAULT_DOWNSAMPLES,
        env = "KFB_DOWNSAMPLES"
    )]
    pub downsamples: Vec<f64>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.slide.as_os_str().is_empty() {
            return Err("Slide path is required".to_string());
        }

        if self.library.as_os_str().is_empty() {
            return Err(
                "Vendor library path is empty. Set --library or KFB_LIBRARY_PATH".to_string(),
            );
        }

        if let Some(factor) = self.downsamples.iter().find(|d| !d.is_finite()) {
            return Err(format!("Downsample factor must be finite, got {}", factor));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
