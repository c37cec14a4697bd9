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

pub mod content_cache;
pub mod tree_cache;
pub mod tree_index;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

pub use content_cache::{ContentCache, ContentCacheOptions, ContentCacheStats};
pub use tree_cache::{TreeCache, TreeCacheOptions, TreeCacheStats};
pub use tree_index::{TreeIndex, TreeNode};

/// Rolling average of fetched tree sizes: `avg' = (avg*9 + sample) / 10`,
/// seeded by the first sample.
///
/// Guarded by a mutex rather than a CAS loop: under many parallel writers
/// the CAS version livelocks, and outside synthetic stress the mutex is
/// uncontended.
pub struct AverageTreeSize {
    avg: Mutex<Option<f64>>,
}

impl AverageTreeSize {
    pub fn new() -> Self {
        Self {
            avg: Mutex::new(None),
        }
    }

    pub fn update(&self, sample: f64) {
        let mut guard = self.avg.lock();
        *guard = Some(match *guard {
            None => sample,
            Some(avg) => (avg * 9.0 + sample) / 10.0,
        });
    }

    pub fn get(&self) -> f64 {
        self.avg.lock().unwrap_or(0.0)
    }
}

impl Default for AverageTreeSize {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared atomic counter set used by both caches.
#[derive(Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl Counters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }
}
