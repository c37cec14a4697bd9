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

pub mod branch;
pub mod engine;
pub mod metrics;
pub mod orchestrator;
pub mod pr;
pub mod scratch;
pub mod state;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    cache::{ContentCache, TreeCache},
    config::{ConfigError, SyncOptions},
    context::ContextError,
    git::{GitDriver, GitError},
    github::{GithubClient, GithubError},
    processor::ProcessError,
    resolver::ConflictError,
};

pub use pr::DescriptionGenerator;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    ConfigInvalid(#[from] ConfigError),

    #[error("state discovery failed: {0}")]
    StateDiscoveryFailed(String),

    #[error("no eligible target matches the filter [{0}]")]
    TargetNotMatchingFilter(String),

    #[error("failed to clone source {repo}: {source}")]
    SourceCloneFailed { repo: String, source: GitError },

    #[error("file processing failed: {0}")]
    FileProcessingFailed(ProcessError),

    /// Every directory mapping failed; wraps the first cause so a canceled
    /// context stays visible.
    #[error("all {count} directory mappings failed, first error: {first}")]
    AllDirectoriesFailed { count: usize, first: ProcessError },

    #[error("commit failed: {0}")]
    CommitFailed(GitError),

    #[error("push failed: {0}")]
    PushFailed(GitError),

    #[error("could not create pull request: {0}")]
    PrCreateFailed(GithubError),

    #[error("could not update pull request: {0}")]
    PrUpdateFailed(GithubError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// True when a canceled or deadline-exceeded context is the root cause.
    pub fn is_context_error(&self) -> bool {
        match self {
            SyncError::Context(_) => true,
            SyncError::FileProcessingFailed(ProcessError::Context(_)) => true,
            SyncError::AllDirectoriesFailed {
                first: ProcessError::Context(_),
                ..
            } => true,
            SyncError::SourceCloneFailed {
                source: GitError::Context(_),
                ..
            } => true,
            SyncError::CommitFailed(GitError::Context(_)) => true,
            SyncError::PushFailed(GitError::Context(_)) => true,
            SyncError::PrCreateFailed(GithubError::Context(_)) => true,
            SyncError::PrUpdateFailed(GithubError::Context(_)) => true,
            _ => false,
        }
    }
}

/// Narrow capability bundle handed to orchestrators and processors instead
/// of back-references to the engine. Caches are explicit objects owned
/// here; there are no process-wide singletons.
pub struct SyncServices {
    pub git: Arc<dyn GitDriver>,
    pub github: Arc<dyn GithubClient>,
    pub trees: Arc<TreeCache>,
    pub contents: Arc<ContentCache>,
    pub options: SyncOptions,
    pub generator: Option<Arc<dyn DescriptionGenerator>>,
}
