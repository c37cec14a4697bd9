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

pub mod system;

use std::path::Path;

use thiserror::Error;

use crate::context::{Context, ContextError};

#[derive(Debug, Error)]
pub enum GitError {
    /// Branch creation or non-fast-forward push hit an existing branch.
    #[error("branch '{0}' already exists")]
    BranchAlreadyExists(String),

    /// Commit was requested on a clean tree.
    #[error("nothing to commit")]
    NoChanges,

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Options applied to clone operations.
#[derive(Debug, Default, Clone)]
pub struct CloneOptions {
    /// Skip blobs larger than this many bytes (`--filter=blob:limit=N`).
    /// Must be disabled for clones whose diffs feed PR descriptions.
    pub blob_size_limit: Option<u64>,
    /// Shallow clone depth.
    pub depth: Option<u32>,
}

/// Abstraction of the local git binary.
///
/// The sync pipeline drives every working-copy operation through this trait
/// so tests can substitute an in-memory double. Implementations map the two
/// well-known failure modes onto [`GitError::BranchAlreadyExists`] and
/// [`GitError::NoChanges`].
pub trait GitDriver: Send + Sync {
    fn clone_repo(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        opts: &CloneOptions,
    ) -> Result<(), GitError>;

    fn clone_with_branch(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        branch: &str,
        opts: &CloneOptions,
    ) -> Result<(), GitError>;

    fn clone_at_tag(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        tag: &str,
        opts: &CloneOptions,
    ) -> Result<(), GitError>;

    fn checkout(&self, ctx: &Context, path: &Path, rev: &str) -> Result<(), GitError>;

    fn create_branch(&self, ctx: &Context, path: &Path, name: &str) -> Result<(), GitError>;

    fn add(&self, ctx: &Context, path: &Path, pathspecs: &[String]) -> Result<(), GitError>;

    fn commit(&self, ctx: &Context, path: &Path, message: &str) -> Result<(), GitError>;

    fn current_commit_sha(&self, ctx: &Context, path: &Path) -> Result<String, GitError>;

    /// Paths touched by the commit at HEAD (`diff --name-only HEAD~1`).
    fn changed_files(&self, ctx: &Context, path: &Path) -> Result<Vec<String>, GitError>;

    fn batch_remove_files(
        &self,
        ctx: &Context,
        path: &Path,
        paths: &[String],
        cached: bool,
    ) -> Result<(), GitError>;

    fn push(
        &self,
        ctx: &Context,
        path: &Path,
        remote: &str,
        branch: &str,
        force: bool,
    ) -> Result<(), GitError>;

    /// Diff against HEAD (or the index when `staged`), ignoring whitespace.
    /// An empty string means a clean tree.
    fn diff_ignore_whitespace(
        &self,
        ctx: &Context,
        path: &Path,
        staged: bool,
    ) -> Result<String, GitError>;
}
