//! CLI output formatting for all actions.
//!
//! # Output Format
//!
//! ## Metadata
//!
//! ```text
//! image.png
//!     Format: png 640x480
//!     Color: srgb, 3 channels, uchar
//!     Alpha: no
//!     Orientation: 6
//!     Profile: none
//!     Size: 12.1 KiB
//! ```
//!
//! ## Stats
//!
//! ```text
//! image.png
//!     Channel 0: min 0, max 255, mean 127.50, stdev 73.90
//!         min at (0, 0), max at (15, 0)
//!     Opaque: yes
//!     Entropy: 7.84 bits
//!     Dominant: #f80808
//! ```
//!
//! ## Process
//!
//! ```text
//! /tmp/out.jpg
//!     Wrote jpeg 200x150, 3 channels, 8.0 KiB
//! ```
//!
//! # Architecture
//!
//! Each action has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::imaging::{ImageMetadata, ImageStats, OutputInfo};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Human-readable byte count with binary units.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ============================================================================
// Metadata
// ============================================================================

pub fn format_metadata(label: &str, meta: &ImageMetadata) -> Vec<String> {
    let mut lines = vec![label.to_string()];
    let pad = indent(1);
    lines.push(format!("{pad}Format: {} {}x{}", meta.format, meta.width, meta.height));
    lines.push(format!(
        "{pad}Color: {}, {} channels, {}",
        meta.space, meta.channels, meta.depth
    ));
    lines.push(format!("{pad}Alpha: {}", yes_no(meta.has_alpha)));
    if let Some(orientation) = meta.orientation {
        lines.push(format!("{pad}Orientation: {orientation}"));
    }
    lines.push(format!(
        "{pad}Profile: {}",
        if meta.has_profile { "embedded" } else { "none" }
    ));
    lines.push(format!("{pad}Size: {}", format_size(meta.size)));
    lines
}

pub fn print_metadata(label: &str, meta: &ImageMetadata) {
    for line in format_metadata(label, meta) {
        println!("{}", line);
    }
}

// ============================================================================
// Stats
// ============================================================================

pub fn format_stats(label: &str, stats: &ImageStats) -> Vec<String> {
    let mut lines = vec![label.to_string()];
    for (index, channel) in stats.channels.iter().enumerate() {
        lines.push(format!(
            "{}Channel {index}: min {}, max {}, mean {:.2}, stdev {:.2}",
            indent(1),
            channel.min,
            channel.max,
            channel.mean,
            channel.stdev
        ));
        lines.push(format!(
            "{}min at ({}, {}), max at ({}, {})",
            indent(2),
            channel.min_x,
            channel.min_y,
            channel.max_x,
            channel.max_y
        ));
    }
    lines.push(format!("{}Opaque: {}", indent(1), yes_no(stats.is_opaque)));
    lines.push(format!("{}Entropy: {:.2} bits", indent(1), stats.entropy));
    let d = stats.dominant;
    lines.push(format!(
        "{}Dominant: #{:02x}{:02x}{:02x}",
        indent(1),
        d.r,
        d.g,
        d.b
    ));
    lines
}

pub fn print_stats(label: &str, stats: &ImageStats) {
    for line in format_stats(label, stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Process
// ============================================================================

pub fn format_output_info(label: &str, info: &OutputInfo) -> Vec<String> {
    vec![
        label.to_string(),
        format!(
            "{}Wrote {} {}x{}, {} channels, {}",
            indent(1),
            info.format,
            info.width,
            info.height,
            info.channels,
            format_size(info.size)
        ),
    ]
}

/// Print to stdout.
pub fn print_output_info(label: &str, info: &OutputInfo) {
    for line in format_output_info(label, info) {
        println!("{}", line);
    }
}
