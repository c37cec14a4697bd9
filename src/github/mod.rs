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

pub mod rest;
pub mod types;

use thiserror::Error;

use crate::context::{Context, ContextError};

pub use types::{
    Branch, Commit, GitTree, PrState, PullRequest, PullRequestSpec, PullRequestUpdate, RepoFile,
    TreeEntry, TreeEntryKind, User,
};

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// 403 with rate-limit exhaustion.
    #[error("rate limited")]
    RateLimited,

    /// HTTP 422 on PR creation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl GithubError {
    /// Transient failures the tree cache may retry: network errors, 5xx and
    /// rate-limit 403. Context errors never retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GithubError::Network(_) | GithubError::Server { .. } | GithubError::RateLimited
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GithubError::NotFound { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GithubError::RateLimited)
    }
}

/// Read/write surface of the GitHub API used by the sync pipeline.
///
/// `get_file` must always receive the configured target branch as `rev`,
/// never an empty string: content lookups against the default branch have
/// produced silent mis-diffs when the target branch diverged.
pub trait GithubClient: Send + Sync {
    fn get_file(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        rev: &str,
    ) -> Result<RepoFile, GithubError>;

    fn get_commit(&self, ctx: &Context, repo: &str, rev: &str) -> Result<Commit, GithubError>;

    /// Recursive tree fetch. The result may be truncated by the provider.
    fn get_git_tree(
        &self,
        ctx: &Context,
        repo: &str,
        sha: &str,
        recursive: bool,
    ) -> Result<GitTree, GithubError>;

    fn list_branches(&self, ctx: &Context, repo: &str) -> Result<Vec<Branch>, GithubError>;

    fn get_branch(&self, ctx: &Context, repo: &str, name: &str) -> Result<Branch, GithubError>;

    fn delete_branch(&self, ctx: &Context, repo: &str, name: &str) -> Result<(), GithubError>;

    fn list_pull_requests(
        &self,
        ctx: &Context,
        repo: &str,
        state: PrState,
    ) -> Result<Vec<PullRequest>, GithubError>;

    /// Single-PR lookup; unlike the list endpoint this carries the
    /// mergeability of the PR.
    fn get_pull_request(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, GithubError>;

    fn create_pull_request(
        &self,
        ctx: &Context,
        repo: &str,
        spec: &PullRequestSpec,
    ) -> Result<PullRequest, GithubError>;

    fn update_pull_request(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, GithubError>;

    fn current_user(&self, ctx: &Context) -> Result<User, GithubError>;
}
