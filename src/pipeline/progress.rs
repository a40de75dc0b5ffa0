// src/pipeline/progress.rs

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str =
    "{spinner:.blue} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({per_sec}, ETA: {eta})";

fn create_progress_bar(total_items: u64, message: &str, template: &str) -> ProgressBar {
    let pb = if total_items == 0 {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::new(total_items)
    };
    pb.set_message(message.to_string());
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Completion counter shared by the workers. Cloning shares the same bar.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// A hidden reporter still counts, it just never draws.
    pub fn new(total: u64, enabled: bool) -> Self {
        let bar = create_progress_bar(total, "Addresses geocoded", TEMPLATE);
        if !enabled {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        ProgressReporter { bar }
    }

    pub fn hidden(total: u64) -> Self {
        Self::new(total, false)
    }

    pub fn advance(&self) {
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Addresses geocoded");
    }
}
