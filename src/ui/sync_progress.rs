// cotorra is a multi-repository file broadcast tool
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    ui,
    ui::progress::{EnhancedProgressReporter, ProgressReporter},
};

/// Counter snapshot taken when a target finishes processing.
#[derive(Debug, Default, Clone)]
pub struct ProcessSummary {
    pub files_processed: u64,
    pub files_changed: u64,
    pub binary_files_skipped: u64,
    pub binary_bytes_skipped: u64,
    pub transform_successes: u64,
    pub transform_errors: u64,
    pub transform_time_ms: u64,
}

/// Progress reporter for one target's file pipeline: a spinner-style bar fed
/// by the batch workers plus atomic counters for the summary.
pub struct SyncProgressReporter {
    files_processed: AtomicU64,
    files_changed: AtomicU64,
    binary_files_skipped: AtomicU64,
    binary_bytes_skipped: AtomicU64,
    transform_successes: AtomicU64,
    transform_errors: AtomicU64,
    transform_time_ms: AtomicU64,

    progress_bar: ProgressBar,
}

impl SyncProgressReporter {
    pub fn new(target_repo: &str) -> Self {
        let progress_bar = ProgressBar::with_draw_target(None, ui::default_bar_draw_target());
        progress_bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap()
                .tick_chars(ui::SPINNER_TICK_CHARS),
        );
        progress_bar.set_prefix(target_repo.to_string());
        progress_bar.enable_steady_tick(Duration::from_millis(33));

        Self {
            files_processed: AtomicU64::new(0),
            files_changed: AtomicU64::new(0),
            binary_files_skipped: AtomicU64::new(0),
            binary_bytes_skipped: AtomicU64::new(0),
            transform_successes: AtomicU64::new(0),
            transform_errors: AtomicU64::new(0),
            transform_time_ms: AtomicU64::new(0),
            progress_bar,
        }
    }

    pub fn finalize(&self) {
        self.progress_bar.finish_and_clear();
    }

    pub fn get_summary(&self) -> ProcessSummary {
        ProcessSummary {
            files_processed: self.files_processed.load(Ordering::SeqCst),
            files_changed: self.files_changed.load(Ordering::SeqCst),
            binary_files_skipped: self.binary_files_skipped.load(Ordering::SeqCst),
            binary_bytes_skipped: self.binary_bytes_skipped.load(Ordering::SeqCst),
            transform_successes: self.transform_successes.load(Ordering::SeqCst),
            transform_errors: self.transform_errors.load(Ordering::SeqCst),
            transform_time_ms: self.transform_time_ms.load(Ordering::SeqCst),
        }
    }
}

impl ProgressReporter for SyncProgressReporter {
    fn update_progress(&self, current: usize, total: usize, message: &str) {
        self.files_processed.store(current as u64, Ordering::Relaxed);
        self.progress_bar
            .set_message(format!("[{current}/{total}] {message}"));
    }

    fn enhanced(&self) -> Option<&dyn EnhancedProgressReporter> {
        Some(self)
    }
}

impl EnhancedProgressReporter for SyncProgressReporter {
    fn record_binary_file_skipped(&self, size: u64) {
        self.binary_files_skipped.fetch_add(1, Ordering::Relaxed);
        self.binary_bytes_skipped.fetch_add(size, Ordering::Relaxed);
    }

    fn record_transform_success(&self, duration: Duration) {
        self.transform_successes.fetch_add(1, Ordering::Relaxed);
        self.transform_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    fn record_transform_error(&self) {
        self.transform_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_file_changed(&self) {
        self.files_changed.fetch_add(1, Ordering::Relaxed);
    }
}
