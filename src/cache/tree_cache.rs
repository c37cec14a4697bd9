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
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::RwLock;

use crate::{
    context::Context,
    github::{GithubClient, GithubError},
    global::defaults,
    ui::cli,
    utils::retry::backoff_delay,
};

use super::{AverageTreeSize, Counters, TreeIndex, TreeNode};

#[derive(Debug, Clone)]
pub struct TreeCacheOptions {
    pub ttl: Duration,
    pub max_entries: usize,
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl Default for TreeCacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(defaults::TREE_CACHE_TTL_SECS),
            max_entries: defaults::TREE_CACHE_MAX_ENTRIES,
            max_retries: defaults::DEFAULT_MAX_RETRIES,
            retry_base: Duration::from_millis(defaults::DEFAULT_RETRY_BASE_MS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub rate_limit_hits: u64,
    pub api_calls_saved: u64,
    pub average_tree_size: f64,
    pub entries: usize,
}

struct Entry {
    index: Arc<TreeIndex>,
    inserted_at: Instant,
    stamp: u64,
}

/// LRU bookkeeping: `order` maps an access stamp back to the cache key, so
/// the oldest entry is always `order.first_key_value()`.
struct State {
    entries: BTreeMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_stamp: u64,
}

/// TTL+LRU cache of [`TreeIndex`]es keyed by `repo:ref`.
///
/// A single write lock covers the lookup and the access-time touch, so hits
/// can never lose their LRU update. Statistics are atomic counters; the
/// rolling average tree size is mutex-guarded.
pub struct TreeCache {
    github: Arc<dyn GithubClient>,
    opts: TreeCacheOptions,
    state: RwLock<State>,
    counters: Counters,
    rate_limit_hits: AtomicU64,
    api_calls_saved: AtomicU64,
    avg_tree_size: AverageTreeSize,
}

fn cache_key(repo: &str, rev: &str) -> String {
    format!("{repo}:{rev}")
}

impl TreeCache {
    pub fn new(github: Arc<dyn GithubClient>, opts: TreeCacheOptions) -> Self {
        Self {
            github,
            opts,
            state: RwLock::new(State {
                entries: BTreeMap::new(),
                order: BTreeMap::new(),
                next_stamp: 0,
            }),
            counters: Counters::default(),
            rate_limit_hits: AtomicU64::new(0),
            api_calls_saved: AtomicU64::new(0),
            avg_tree_size: AverageTreeSize::new(),
        }
    }

    /// Returns the tree of `repo` at `rev`, fetching and indexing it on a
    /// miss. Transient failures are retried with jittered exponential
    /// backoff; context errors are surfaced verbatim and never retried.
    pub fn get_tree(
        &self,
        ctx: &Context,
        repo: &str,
        rev: &str,
    ) -> Result<Arc<TreeIndex>, GithubError> {
        let key = cache_key(repo, rev);

        {
            let mut state = self.state.write();
            let fresh = match state.entries.get(&key) {
                Some(entry) => entry.inserted_at.elapsed() < self.opts.ttl,
                None => false,
            };
            if fresh {
                let stamp = state.next_stamp;
                state.next_stamp += 1;
                let entry = state.entries.get_mut(&key).unwrap();
                let old_stamp = entry.stamp;
                entry.stamp = stamp;
                let index = entry.index.clone();
                state.order.remove(&old_stamp);
                state.order.insert(stamp, key);
                self.counters.hit();
                return Ok(index);
            }
            if let Some(entry) = state.entries.remove(&key) {
                state.order.remove(&entry.stamp);
                self.counters.evicted();
            }
        }

        self.counters.miss();
        let index = Arc::new(self.fetch_with_retry(ctx, repo, rev)?);
        self.avg_tree_size.update(index.file_count() as f64);

        let mut state = self.state.write();
        let stamp = state.next_stamp;
        state.next_stamp += 1;
        state.order.insert(stamp, key.clone());
        let previous = state.entries.insert(
            key,
            Entry {
                index: index.clone(),
                inserted_at: Instant::now(),
                stamp,
            },
        );
        // A racing miss may have populated the key already; drop its stamp so
        // the order map never points at a dead entry.
        if let Some(prev) = previous {
            state.order.remove(&prev.stamp);
        }
        while state.entries.len() > self.opts.max_entries {
            if let Some((_, lru_key)) = state.order.pop_first() {
                state.entries.remove(&lru_key);
                self.counters.evicted();
            } else {
                break;
            }
        }

        Ok(index)
    }

    /// Existence of many files answered from one tree fetch.
    pub fn batch_check_files(
        &self,
        ctx: &Context,
        repo: &str,
        rev: &str,
        paths: &[String],
    ) -> Result<BTreeMap<String, bool>, GithubError> {
        let index = self.get_tree(ctx, repo, rev)?;
        self.api_calls_saved
            .fetch_add(paths.len().saturating_sub(1) as u64, Ordering::Relaxed);
        Ok(paths
            .iter()
            .map(|p| (p.clone(), index.has_file(p)))
            .collect())
    }

    pub fn batch_check_directories(
        &self,
        ctx: &Context,
        repo: &str,
        rev: &str,
        dirs: &[String],
    ) -> Result<BTreeMap<String, bool>, GithubError> {
        let index = self.get_tree(ctx, repo, rev)?;
        self.api_calls_saved
            .fetch_add(dirs.len().saturating_sub(1) as u64, Ordering::Relaxed);
        Ok(dirs
            .iter()
            .map(|d| (d.clone(), index.has_directory(d)))
            .collect())
    }

    /// Direct children blobs of `dir`.
    pub fn get_files_in_directory(
        &self,
        ctx: &Context,
        repo: &str,
        rev: &str,
        dir: &str,
    ) -> Result<Vec<TreeNode>, GithubError> {
        let index = self.get_tree(ctx, repo, rev)?;
        Ok(index
            .files_in_directory(dir)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn invalidate(&self, repo: &str, rev: &str) {
        let key = cache_key(repo, rev);
        let mut state = self.state.write();
        if let Some(entry) = state.entries.remove(&key) {
            state.order.remove(&entry.stamp);
        }
    }

    pub fn stats(&self) -> TreeCacheStats {
        TreeCacheStats {
            hits: self.counters.hits.load(Ordering::SeqCst),
            misses: self.counters.misses.load(Ordering::SeqCst),
            evictions: self.counters.evictions.load(Ordering::SeqCst),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::SeqCst),
            api_calls_saved: self.api_calls_saved.load(Ordering::SeqCst),
            average_tree_size: self.avg_tree_size.get(),
            entries: self.state.read().entries.len(),
        }
    }

    fn fetch_with_retry(
        &self,
        ctx: &Context,
        repo: &str,
        rev: &str,
    ) -> Result<TreeIndex, GithubError> {
        let mut attempt = 1u32;
        loop {
            ctx.check()?;

            match self.fetch_once(ctx, repo, rev) {
                Ok(index) => return Ok(index),
                Err(err) => {
                    if err.is_rate_limited() {
                        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                    }
                    if !err.is_retryable() || attempt >= self.opts.max_retries {
                        return Err(err);
                    }
                    let delay = backoff_delay(self.opts.retry_base, attempt);
                    cli::log_warning(&format!(
                        "Tree fetch for {repo}@{rev} failed (attempt {attempt}): {err}. \
                         Retrying in {}ms",
                        delay.as_millis()
                    ));
                    ctx.sleep(delay)?;
                    attempt += 1;
                }
            }
        }
    }

    fn fetch_once(&self, ctx: &Context, repo: &str, rev: &str) -> Result<TreeIndex, GithubError> {
        let commit = self.github.get_commit(ctx, repo, rev)?;
        let tree = self.github.get_git_tree(ctx, repo, &commit.sha, true)?;
        if tree.truncated {
            // Partial index accepted; no paging today.
            cli::log_warning(&format!(
                "Tree listing for {repo}@{rev} was truncated by the provider"
            ));
        }
        Ok(TreeIndex::from_git_tree(&tree))
    }
}
