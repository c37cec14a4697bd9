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
    sync::{
        Arc,
        atomic::Ordering,
    },
    time::{Duration, Instant},
};

use parking_lot::RwLock;

use crate::global::defaults;

use super::Counters;

#[derive(Debug, Clone)]
pub struct ContentCacheOptions {
    pub ttl: Duration,
    pub max_bytes: u64,
}

impl Default for ContentCacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(defaults::CONTENT_CACHE_TTL_SECS),
            max_bytes: defaults::CONTENT_CACHE_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub total_bytes: u64,
}

struct Entry {
    content: Arc<Vec<u8>>,
    inserted_at: Instant,
    stamp: u64,
    size: u64,
}

struct State {
    entries: BTreeMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_stamp: u64,
    total_bytes: u64,
}

/// TTL + byte-bounded LRU cache of `(repo, branch, path) → content`.
///
/// Hits must refresh the access time. The read-then-upgrade locking pattern
/// is not upgrade-safe and has lost updates before, so `get` takes the write
/// lock for the whole lookup-and-touch. A concurrent eviction between two
/// calls simply turns the second into a miss.
pub struct ContentCache {
    opts: ContentCacheOptions,
    state: RwLock<State>,
    counters: Counters,
}

fn cache_key(repo: &str, branch: &str, path: &str) -> String {
    format!("{repo}:{branch}:{path}")
}

impl ContentCache {
    pub fn new(opts: ContentCacheOptions) -> Self {
        Self {
            opts,
            state: RwLock::new(State {
                entries: BTreeMap::new(),
                order: BTreeMap::new(),
                next_stamp: 0,
                total_bytes: 0,
            }),
            counters: Counters::default(),
        }
    }

    /// Looks up cached content. Exactly one of hits/misses is incremented
    /// per call; an entry past its TTL counts as a miss and is dropped.
    pub fn get(&self, repo: &str, branch: &str, path: &str) -> Option<Arc<Vec<u8>>> {
        let key = cache_key(repo, branch, path);
        let mut state = self.state.write();

        let expired = match state.entries.get(&key) {
            None => {
                self.counters.miss();
                return None;
            }
            Some(entry) => entry.inserted_at.elapsed() >= self.opts.ttl,
        };

        if expired {
            let entry = state.entries.remove(&key).unwrap();
            state.order.remove(&entry.stamp);
            state.total_bytes -= entry.size;
            self.counters.evicted();
            self.counters.miss();
            return None;
        }

        let stamp = state.next_stamp;
        state.next_stamp += 1;
        let entry = state.entries.get_mut(&key).unwrap();
        let old_stamp = entry.stamp;
        entry.stamp = stamp;
        let content = entry.content.clone();
        state.order.remove(&old_stamp);
        state.order.insert(stamp, key);
        self.counters.hit();
        Some(content)
    }

    pub fn put(&self, repo: &str, branch: &str, path: &str, content: Vec<u8>) {
        let size = content.len() as u64;
        // Never let one oversized blob churn the whole cache.
        if size > self.opts.max_bytes {
            return;
        }

        let key = cache_key(repo, branch, path);
        let mut state = self.state.write();

        let stamp = state.next_stamp;
        state.next_stamp += 1;
        state.order.insert(stamp, key.clone());
        let previous = state.entries.insert(
            key,
            Entry {
                content: Arc::new(content),
                inserted_at: Instant::now(),
                stamp,
                size,
            },
        );
        state.total_bytes += size;
        if let Some(prev) = previous {
            state.order.remove(&prev.stamp);
            state.total_bytes -= prev.size;
        }

        while state.total_bytes > self.opts.max_bytes {
            let Some((_, lru_key)) = state.order.pop_first() else {
                break;
            };
            if let Some(entry) = state.entries.remove(&lru_key) {
                state.total_bytes -= entry.size;
                self.counters.evicted();
            }
        }
    }

    pub fn stats(&self) -> ContentCacheStats {
        let state = self.state.read();
        ContentCacheStats {
            hits: self.counters.hits.load(Ordering::SeqCst),
            misses: self.counters.misses.load(Ordering::SeqCst),
            evictions: self.counters.evictions.load(Ordering::SeqCst),
            entries: state.entries.len(),
            total_bytes: state.total_bytes,
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(ContentCacheOptions::default())
    }
}
