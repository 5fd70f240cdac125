//! Console output control for the command line tool

use crate::event::ProgressEvent;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct OutputManager {
    pub verbose: bool,
    quiet: bool,
    start_time: Option<Instant>,
}

impl OutputManager {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.print_with_timestamp("INFO", message, "ℹ️");
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.print_with_timestamp("SUCCESS", message, "✅");
        }
    }

    pub fn warning(&self, message: &str) {
        self.eprint_with_timestamp("WARN", message, "⚠️");
    }

    pub fn error(&self, message: &str) {
        self.eprint_with_timestamp("ERROR", message, "❌");
    }

    // Section headers
    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }

        if self.verbose {
            let separator = "━".repeat(60);
            println!("\n{}", separator);
            println!("📋 {}", title);
            println!("{}", separator);
        } else {
            println!("\n📋 {}", title);
        }
    }

    /// One progress record; layer-level chatter only in verbose mode
    pub fn event(&self, event: &ProgressEvent) {
        if self.quiet {
            return;
        }

        let line = event.to_string();
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }

        if event.id().is_some() && !self.verbose {
            return;
        }
        println!("   {}", line);
    }

    fn print_with_timestamp(&self, level: &str, message: &str, emoji: &str) {
        println!("{}", self.format_line(level, message, emoji));
    }

    fn eprint_with_timestamp(&self, level: &str, message: &str, emoji: &str) {
        eprintln!("{}", self.format_line(level, message, emoji));
    }

    fn format_line(&self, level: &str, message: &str, emoji: &str) -> String {
        if self.verbose {
            let timestamp = match self.start_time {
                Some(start_time) => format!("[{:8.3}s]", start_time.elapsed().as_secs_f64()),
                None => String::new(),
            };
            format!("{} {} {} {}", timestamp, emoji, level, message)
        } else {
            format!("{} {}", emoji, message)
        }
    }

    pub fn format_size(&self, size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }

    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{:.1}s", duration.as_secs_f64())
        } else if secs < 3600 {
            format!("{}m{:02}s", secs / 60, secs % 60)
        } else {
            format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    pub fn elapsed_time(&self) -> String {
        match self.start_time {
            Some(start_time) => self.format_duration(start_time.elapsed()),
            None => "Unknown".to_string(),
        }
    }
}
