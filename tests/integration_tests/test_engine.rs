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

use cotorra::{
    cache::{ContentCache, TreeCache, TreeCacheOptions},
    config::{FileMapping, GroupConfig, SyncConfig, SyncOptions, TargetConfig},
    context::Context,
    github::{GithubClient, PullRequest},
    sync::{
        SyncError, SyncServices,
        engine::Engine,
        state::{
            GithubStateDiscoverer, SourceState, StateDiscoverer, SyncState, TargetState,
            TargetStatus,
        },
    },
};

use crate::integration_tests::{MockGit, MockGithub, SOURCE_COMMIT, SOURCE_REPO, TARGET_REPO};

/// Discovery double returning a pre-built state.
struct FixedState(SyncState);

impl StateDiscoverer for FixedState {
    fn discover(
        &self,
        _ctx: &Context,
        _group: &GroupConfig,
    ) -> Result<SyncState, SyncError> {
        Ok(self.0.clone())
    }
}

fn config_with_targets(repos: &[&str]) -> SyncConfig {
    SyncConfig {
        groups: vec![GroupConfig {
            id: "default".to_string(),
            name: "Default".to_string(),
            source: cotorra::config::SourceConfig {
                repo: SOURCE_REPO.to_string(),
                branch: "main".to_string(),
                ..Default::default()
            },
            targets: repos
                .iter()
                .map(|repo| TargetConfig {
                    repo: repo.to_string(),
                    branch: "main".to_string(),
                    files: vec![FileMapping {
                        src: "README.md".to_string(),
                        dest: "README.md".to_string(),
                        delete: false,
                    }],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }],
    }
}

fn state_with(statuses: &[(&str, TargetStatus)]) -> SyncState {
    SyncState {
        source: SourceState {
            repo: SOURCE_REPO.to_string(),
            branch: "main".to_string(),
            latest_commit: SOURCE_COMMIT.to_string(),
        },
        targets: statuses
            .iter()
            .map(|(repo, status)| {
                let mut state = TargetState::unknown(repo);
                state.status = *status;
                if *status == TargetStatus::UpToDate {
                    state.last_sync_commit = Some(SOURCE_COMMIT.to_string());
                }
                (repo.to_string(), state)
            })
            .collect::<BTreeMap<_, _>>(),
    }
}

fn engine(
    git: Arc<MockGit>,
    github: Arc<MockGithub>,
    config: SyncConfig,
    state: SyncState,
    options: SyncOptions,
) -> Engine {
    let github_dyn: Arc<dyn GithubClient> = github;
    let services = Arc::new(SyncServices {
        git,
        github: github_dyn.clone(),
        trees: Arc::new(TreeCache::new(github_dyn, TreeCacheOptions::default())),
        contents: Arc::new(ContentCache::default()),
        options,
        generator: None,
    });
    Engine::new(services, config, Arc::new(FixedState(state)))
}

#[test]
fn test_conflict_target_is_skipped_without_error() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new")]));
    let github = Arc::new(MockGithub::new());

    let engine = engine(
        git.clone(),
        github.clone(),
        config_with_targets(&[TARGET_REPO, "org/conflicted"]),
        state_with(&[
            (TARGET_REPO, TargetStatus::UpToDate),
            ("org/conflicted", TargetStatus::Conflict),
        ]),
        SyncOptions::default(),
    );

    let report = engine.sync(&Context::background(), &[]).unwrap();

    // Neither target ran: no clones, no commits, no PRs.
    assert!(report.targets.is_empty());
    assert_eq!(report.failures, 0);
    assert!(git.calls_matching("clone").is_empty());
    assert!(git.calls_matching("commit").is_empty());
    assert!(github.created_prs.lock().unwrap().is_empty());
}

#[test]
fn test_one_failure_does_not_cancel_siblings() {
    // Clones fail for everything, so each target fails independently.
    let mut git = MockGit::new(&[("README.md", b"new")]);
    git.fail_clones = true;
    let git = Arc::new(git);
    let github = Arc::new(
        MockGithub::new()
            .with_file(TARGET_REPO, "main", "README.md", b"old")
            .with_file("org/other", "main", "README.md", b"old"),
    );

    let engine = engine(
        git,
        github,
        config_with_targets(&[TARGET_REPO, "org/other"]),
        state_with(&[
            (TARGET_REPO, TargetStatus::Behind),
            ("org/other", TargetStatus::Behind),
        ]),
        SyncOptions::default(),
    );

    let err = engine.sync(&Context::background(), &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "completed with 2 failures out of 2 targets"
    );
}

#[test]
fn test_successful_run_aggregates_all_targets() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new")]));
    let github = Arc::new(
        MockGithub::new()
            .with_file(TARGET_REPO, "main", "README.md", b"old")
            .with_file("org/other", "main", "README.md", b"old"),
    );

    let engine = engine(
        git,
        github.clone(),
        config_with_targets(&[TARGET_REPO, "org/other"]),
        state_with(&[
            (TARGET_REPO, TargetStatus::Behind),
            ("org/other", TargetStatus::Behind),
        ]),
        SyncOptions {
            max_concurrency: 2,
            ..Default::default()
        },
    );

    let report = engine.sync(&Context::background(), &[]).unwrap();
    assert_eq!(report.targets.len(), 2);
    assert_eq!(report.failures, 0);
    assert_eq!(github.created_prs.lock().unwrap().len(), 2);
}

#[test]
fn test_explicit_filter_matching_nothing_is_an_error() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new")]));
    let github = Arc::new(MockGithub::new());

    let engine = engine(
        git,
        github,
        config_with_targets(&[TARGET_REPO]),
        state_with(&[(TARGET_REPO, TargetStatus::Behind)]),
        SyncOptions::default(),
    );

    let err = engine
        .sync(&Context::background(), &["org/not-configured".to_string()])
        .unwrap_err();
    assert!(err.to_string().contains("org/not-configured"));
}

#[test]
fn test_canceled_context_starts_no_work() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new")]));
    let github = Arc::new(MockGithub::new());

    let engine = engine(
        git.clone(),
        github,
        config_with_targets(&[TARGET_REPO]),
        state_with(&[(TARGET_REPO, TargetStatus::Behind)]),
        SyncOptions::default(),
    );

    let (ctx, handle) = Context::cancellable();
    handle.cancel();

    assert!(engine.sync(&ctx, &[]).is_err());
    assert!(git.calls_matching("clone").is_empty());
}

#[test]
fn test_conflicted_target_discovered_end_to_end_is_skipped() {
    // Through the real discoverer: the target's open sync PR cannot merge,
    // so the engine routes around it without starting any work.
    let git = Arc::new(MockGit::new(&[("README.md", b"new")]));
    let github = Arc::new(MockGithub::new());
    github.open_prs.lock().unwrap().push(PullRequest {
        number: 11,
        title: "[Sync] Update project files from source repository (0123456)".to_string(),
        body: "conflicted sync".to_string(),
        state: "open".to_string(),
        head_ref: "chore/sync-files-default-20250101-000000-0123456".to_string(),
        base_ref: "main".to_string(),
        html_url: String::new(),
        mergeable: Some(false),
    });

    let github_dyn: Arc<dyn GithubClient> = github.clone();
    let services = Arc::new(SyncServices {
        git: git.clone(),
        github: github_dyn.clone(),
        trees: Arc::new(TreeCache::new(github_dyn.clone(), TreeCacheOptions::default())),
        contents: Arc::new(ContentCache::default()),
        options: SyncOptions::default(),
        generator: None,
    });
    let engine = Engine::new(
        services,
        config_with_targets(&[TARGET_REPO]),
        Arc::new(GithubStateDiscoverer::new(github_dyn)),
    );

    let report = engine.sync(&Context::background(), &[]).unwrap();
    assert!(report.targets.is_empty());
    assert_eq!(report.failures, 0);
    assert!(git.calls_matching("clone").is_empty());
    assert!(github.created_prs.lock().unwrap().is_empty());
}
