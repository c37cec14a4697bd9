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
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;

/// Per-directory-mapping counters recorded during a target sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryMetrics {
    pub src: String,
    pub dest: String,
    pub excluded: Vec<String>,
    pub files_examined: u64,
    pub files_excluded: u64,
    pub files_synced: u64,
    pub processing_ms: u64,
}

/// Counters for one target sync run, mutated concurrently by the file
/// pipeline.
///
/// The directory map is guarded by a read-write lock; [`Self::iterate`]
/// holds the read lock for the whole callback, so callers must not invoke
/// mutating helpers from inside it. Collect what you need, release, then
/// mutate.
#[derive(Default)]
pub struct PerformanceMetrics {
    directories: RwLock<BTreeMap<String, DirectoryMetrics>>,
    total_files: AtomicU64,
    files_deleted: AtomicU64,
    api_calls_saved: AtomicU64,
    cache_hits: AtomicU64,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_directory(&self, metrics: DirectoryMetrics) {
        self.directories
            .write()
            .insert(metrics.dest.clone(), metrics);
    }

    /// Runs `f` for every directory entry under the read lock.
    pub fn iterate(&self, mut f: impl FnMut(&DirectoryMetrics)) {
        let guard = self.directories.read();
        for metrics in guard.values() {
            f(metrics);
        }
    }

    pub fn directory_snapshot(&self) -> Vec<DirectoryMetrics> {
        self.directories.read().values().cloned().collect()
    }

    pub fn add_total_files(&self, n: u64) {
        self.total_files.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_files_deleted(&self, n: u64) {
        self.files_deleted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_api_calls_saved(&self, n: u64) {
        self.api_calls_saved.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_cache_hits(&self, n: u64) {
        self.cache_hits.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::SeqCst)
    }

    pub fn files_deleted(&self) -> u64 {
        self.files_deleted.load(Ordering::SeqCst)
    }

    pub fn api_calls_saved(&self) -> u64 {
        self.api_calls_saved.load(Ordering::SeqCst)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::SeqCst)
    }
}
