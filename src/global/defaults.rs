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

use crate::utils::size;

// -- Concurrency --

/// Worker threads used by the batch file processor. A value of 0 in the
/// configuration is coerced back to this default.
pub const DEFAULT_PROCESS_WORKERS: usize = 10;

/// Engine-level worker pool size (targets synced in parallel).
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

// -- Caches --

/// Time to live of a cached repository tree.
pub const TREE_CACHE_TTL_SECS: u64 = 300;
/// Maximum number of tree indexes kept in memory.
pub const TREE_CACHE_MAX_ENTRIES: usize = 128;

/// Time to live of a cached file content.
pub const CONTENT_CACHE_TTL_SECS: u64 = 300;
/// Byte budget of the content cache.
pub const CONTENT_CACHE_MAX_BYTES: u64 = 64 * size::MiB;

// -- Remote retries --

/// Maximum number of attempts against the tree API before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base delay of the exponential backoff between attempts.
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;

// -- Sync --

/// Branch prefix used when a group does not configure one.
pub const DEFAULT_BRANCH_PREFIX: &str = "chore/sync-files";
/// Remote name targets are pushed to.
pub const DEFAULT_GIT_REMOTE: &str = "origin";
/// Length of the abbreviated commit SHA used in branch names and PR titles.
pub const SHORT_COMMIT_SHA_LEN: usize = 7;

/// Bytes sniffed when deciding whether a file is binary.
pub const BINARY_SNIFF_LEN: usize = 8192;

// -- Scratch directories --

pub const SCRATCH_DIR_PREFIX: &str = "cotorra-";
/// Removal attempts before giving up on a scratch directory.
pub const SCRATCH_CLEANUP_RETRIES: u32 = 3;
pub const SCRATCH_CLEANUP_RETRY_DELAY_MS: u64 = 100;

/// Budget for flushing metrics after the engine context is gone.
pub const METRICS_FLUSH_TIMEOUT_SECS: u64 = 10;

// -- Display --

pub const DEFAULT_VERBOSITY: u32 = 1;
