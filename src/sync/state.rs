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

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    config::GroupConfig,
    context::Context,
    github::{GithubClient, PrState, PullRequest},
    sync::{SyncError, branch::is_sync_branch, pr::parse_metadata},
    ui::cli,
};

/// Where the source repository currently stands.
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    pub repo: String,
    pub branch: String,
    pub latest_commit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    UpToDate,
    /// The target has not seen the latest source commit.
    Behind,
    /// An open sync PR is waiting on the target.
    Pending,
    /// The open sync PR cannot be merged; needs a human.
    Conflict,
    Unknown,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetStatus::UpToDate => "up_to_date",
            TargetStatus::Behind => "behind",
            TargetStatus::Pending => "pending",
            TargetStatus::Conflict => "conflict",
            TargetStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct TargetState {
    pub repo: String,
    pub status: TargetStatus,
    /// Source commit of the last sync that reached this target, recovered
    /// from PR metadata.
    pub last_sync_commit: Option<String>,
    pub open_pr: Option<PullRequest>,
}

impl TargetState {
    pub fn unknown(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            status: TargetStatus::Unknown,
            last_sync_commit: None,
            open_pr: None,
        }
    }
}

/// Discovered state of one group: the source plus each target.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub source: SourceState,
    pub targets: BTreeMap<String, TargetState>,
}

/// Builds the current [`SyncState`] for a group. External systems provide
/// their own implementations; the default one reads GitHub.
pub trait StateDiscoverer: Send + Sync {
    fn discover(&self, ctx: &Context, group: &GroupConfig) -> Result<SyncState, SyncError>;
}

pub struct GithubStateDiscoverer {
    github: Arc<dyn GithubClient>,
}

impl GithubStateDiscoverer {
    pub fn new(github: Arc<dyn GithubClient>) -> Self {
        Self { github }
    }
}

impl StateDiscoverer for GithubStateDiscoverer {
    fn discover(&self, ctx: &Context, group: &GroupConfig) -> Result<SyncState, SyncError> {
        let latest = self
            .github
            .get_commit(ctx, &group.source.repo, &group.source.branch)
            .map_err(|e| {
                SyncError::StateDiscoveryFailed(format!(
                    "could not resolve {}@{}: {e}",
                    group.source.repo, group.source.branch
                ))
            })?;

        let source = SourceState {
            repo: group.source.repo.clone(),
            branch: group.source.branch.clone(),
            latest_commit: latest.sha,
        };

        let prefix = group.effective_branch_prefix();
        let mut targets = BTreeMap::new();

        for target in &group.targets {
            ctx.check()?;

            let open_prs = self
                .github
                .list_pull_requests(ctx, &target.repo, PrState::Open)
                .map_err(|e| {
                    SyncError::StateDiscoveryFailed(format!(
                        "could not list PRs of {}: {e}",
                        target.repo
                    ))
                })?;

            let mut open_pr = open_prs
                .into_iter()
                .find(|pr| is_sync_branch(&pr.head_ref, prefix));

            // The list endpoint does not carry mergeability; re-fetch the
            // sync PR so conflicted ones can be routed around.
            if let Some(pr) = &open_pr {
                match self.github.get_pull_request(ctx, &target.repo, pr.number) {
                    Ok(full) => open_pr = Some(full),
                    Err(e) => cli::log_warning(&format!(
                        "Could not fetch PR #{} of {}: {e}",
                        pr.number, target.repo
                    )),
                }
            }

            let last_sync_commit = open_pr
                .as_ref()
                .and_then(|pr| parse_metadata(&pr.body))
                .map(|meta| meta.source_commit);

            let status = match (&open_pr, &last_sync_commit) {
                (Some(pr), _) if pr.mergeable == Some(false) => TargetStatus::Conflict,
                (Some(_), _) => TargetStatus::Pending,
                (None, Some(commit)) if *commit == source.latest_commit => TargetStatus::UpToDate,
                (None, Some(_)) => TargetStatus::Behind,
                (None, None) => TargetStatus::Unknown,
            };

            targets.insert(
                target.repo.clone(),
                TargetState {
                    repo: target.repo.clone(),
                    status,
                    last_sync_commit,
                    open_pr,
                },
            );
        }

        Ok(SyncState { source, targets })
    }
}
