//! kfb-inspect - Print metadata of a KFB whole slide image.
//!
//! Opens a slide through the vendor library and reports what the adapter
//! exposes: properties, levels, and associated images.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kfb_slide::{detect_vendor, Config, HeaderInfo, OutputFormat, Slide};

fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut slide = match Slide::open(&config.library, &config.slide) {
        Ok(slide) => slide,
        Err(e) => {
            error!("Failed to open {}: {}", config.slide.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let report = SlideReport::collect(&mut slide, &config);
    slide.close();

    match config.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }

    ExitCode::SUCCESS
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "kfb_slide=debug,kfb_inspect=debug"
    } else {
        "kfb_slide=info,kfb_inspect=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Serialize)]
struct SlideReport {
    vendor: &'static str,
    width: u32,
    height: u32,
    header: HeaderInfo,
    properties: Vec<(String, String)>,
    levels: Vec<LevelReport>,
    downsamples: Vec<DownsampleReport>,
    associated_images: Vec<AssociatedReport>,
}

#[derive(Debug, Serialize)]
struct LevelReport {
    level: usize,
    downsample: f64,
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct DownsampleReport {
    downsample: f64,
    best_level: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AssociatedReport {
    name: &'static str,
    width: u32,
    height: u32,
    bytes: usize,
}

impl SlideReport {
    fn collect(slide: &mut Slide, config: &Config) -> Self {
        let (width, height) = slide.dimensions();

        let properties = slide
            .properties()
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let levels = (0..slide.level_count())
            .filter_map(|level| {
                let downsample = slide.level_downsample(level)?;
                let (width, height) = slide.level_dimensions(level)?;
                Some(LevelReport {
                    level,
                    downsample,
                    width,
                    height,
                })
            })
            .collect();

        let downsamples = config
            .downsamples
            .iter()
            .map(|&downsample| DownsampleReport {
                downsample,
                best_level: slide.best_level_for_downsample(downsample),
            })
            .collect();

        let associated_images: Vec<_> = slide
            .associated_images()
            .iter()
            .map(|img| AssociatedReport {
                name: img.name(),
                width: img.width,
                height: img.height,
                bytes: img.byte_len(),
            })
            .collect();
        info!("Found {} associated image(s)", associated_images.len());

        Self {
            vendor: detect_vendor(&config.slide),
            width,
            height,
            header: *slide.header(),
            properties,
            levels,
            downsamples,
            associated_images,
        }
    }
}

fn print_text(report: &SlideReport) {
    println!("Vendor: {}", report.vendor);
    println!("Dimensions: {} x {}", report.width, report.height);
    println!(
        "Header: scan scale {}x, capture resolution {}, block size {}, scan time {}",
        report.header.scan_scale,
        report.header.cap_res,
        report.header.block_size,
        report.header.scan_time
    );

    println!();
    println!("Properties:");
    for (name, value) in &report.properties {
        println!("  {}: {}", name, value);
    }

    println!();
    println!("Levels:");
    for level in &report.levels {
        println!(
            "  {}: downsample {}, {} x {}",
            level.level, level.downsample, level.width, level.height
        );
    }

    println!();
    println!("Best level for downsample:");
    for entry in &report.downsamples {
        match entry.best_level {
            Some(level) => println!("  {}: {}", entry.downsample, level),
            None => println!("  {}: none", entry.downsample),
        }
    }

    println!();
    println!("Associated images:");
    if report.associated_images.is_empty() {
        println!("  (none)");
    }
    for img in &report.associated_images {
        println!(
            "  {}: {} x {}, {} bytes",
            img.name, img.width, img.height, img.bytes
        );
    }
}
