//! Output formatting for CLI

use crate::cli::args::VerbosityLevel;
use crate::core::stream::{Stream, StreamContext};
use colored::Colorize;
use std::time::Duration;

/// Output formatter for CLI
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "info:".blue().bold(), message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "✓".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print debug message
    pub fn debug(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Verbose {
            eprintln!("{} {}", "debug:".dimmed(), message);
        }
    }

    /// Print a command result. Results go to stdout at every verbosity.
    pub fn result(&self, value: &str) {
        println!("{}", value);
    }

    /// Print video information
    pub fn print_video_info(&self, context: &StreamContext, streams: usize) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("{}", context.title.bold());
        println!("  {} {}", "author:".dimmed(), context.author);
        if let Some(length) = context.length_seconds {
            println!("  {} {}", "length:".dimmed(), format_duration(Duration::from_secs(length)));
        }
        if let Some(date) = context.publish_date {
            println!("  {} {}", "published:".dimmed(), date);
        }
        if let Some(js_url) = &context.js_url {
            println!("  {} {}", "player:".dimmed(), js_url);
        }
        println!("  {} {}", "streams:".dimmed(), streams);
        println!();
    }

    /// Print one line per stream
    pub fn print_stream(&self, stream: &Stream) {
        println!("{}", format_stream_line(stream));
        if self.verbosity == VerbosityLevel::Verbose {
            println!("    {}", stream.url.dimmed());
        }
    }
}

/// `itag=18 | 360p | video/mp4 | avc1.42001E,mp4a.40.2 | 503 kbps (12.7 MB)`
fn format_stream_line(stream: &Stream) -> String {
    let quality = stream
        .resolution
        .clone()
        .unwrap_or_else(|| stream.kind.clone());
    let size = if stream.filesize > 0 {
        format!(" ({})", format_bytes(stream.filesize))
    } else {
        String::new()
    };
    let otf = if stream.is_otf { " [otf]" } else { "" };

    format!(
        "  itag={} | {} | {} | {} | {} kbps{}{}",
        stream.itag,
        quality,
        stream.mime_type,
        stream.codecs.join(","),
        stream.bitrate.unwrap_or(0) / 1000,
        size,
        otf
    )
}

/// Format bytes as human-readable string
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = (bytes_f64.ln() / THRESHOLD.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f64 / THRESHOLD.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", value, UNITS[exp])
    }
}

/// Format duration as human-readable string
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}
