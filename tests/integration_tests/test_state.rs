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

use std::sync::Arc;

use cotorra::{
    context::Context,
    github::PullRequest,
    sync::{
        pr::{PrMetadata, render_metadata},
        state::{GithubStateDiscoverer, StateDiscoverer, TargetStatus},
    },
};

use crate::integration_tests::{MockGithub, SOURCE_COMMIT, SOURCE_REPO, TARGET_REPO, simple_group};

fn sync_pr_with_metadata(source_commit: &str, mergeable: Option<bool>) -> PullRequest {
    let meta = PrMetadata {
        group_id: "default".to_string(),
        group_name: "Default".to_string(),
        source_repo: SOURCE_REPO.to_string(),
        source_commit: source_commit.to_string(),
        target_repo: TARGET_REPO.to_string(),
        sync_commit: "fedcba9876543210".to_string(),
        ..Default::default()
    };
    PullRequest {
        number: 7,
        title: "[Sync] Update project files from source repository (0123456)".to_string(),
        body: format!("sync body\n\n{}", render_metadata(&meta)),
        state: "open".to_string(),
        head_ref: "chore/sync-files-default-20250101-000000-0123456".to_string(),
        base_ref: "main".to_string(),
        html_url: String::new(),
        mergeable,
    }
}

#[test]
fn test_open_sync_pr_means_pending_with_recovered_commit() {
    let github = MockGithub::new();
    github
        .open_prs
        .lock()
        .unwrap()
        .push(sync_pr_with_metadata(SOURCE_COMMIT, Some(true)));
    let discoverer = GithubStateDiscoverer::new(Arc::new(github));

    let state = discoverer
        .discover(&Context::background(), &simple_group("main"))
        .unwrap();

    assert_eq!(state.source.latest_commit, SOURCE_COMMIT);
    let target = &state.targets[TARGET_REPO];
    assert_eq!(target.status, TargetStatus::Pending);
    assert_eq!(target.last_sync_commit.as_deref(), Some(SOURCE_COMMIT));
    assert_eq!(target.open_pr.as_ref().unwrap().number, 7);
}

#[test]
fn test_unmergeable_sync_pr_means_conflict() {
    let github = MockGithub::new();
    github
        .open_prs
        .lock()
        .unwrap()
        .push(sync_pr_with_metadata(SOURCE_COMMIT, Some(false)));
    let discoverer = GithubStateDiscoverer::new(Arc::new(github));

    let state = discoverer
        .discover(&Context::background(), &simple_group("main"))
        .unwrap();

    assert_eq!(state.targets[TARGET_REPO].status, TargetStatus::Conflict);
}

#[test]
fn test_unknown_mergeability_stays_pending() {
    let github = MockGithub::new();
    github
        .open_prs
        .lock()
        .unwrap()
        .push(sync_pr_with_metadata(SOURCE_COMMIT, None));
    let discoverer = GithubStateDiscoverer::new(Arc::new(github));

    let state = discoverer
        .discover(&Context::background(), &simple_group("main"))
        .unwrap();

    assert_eq!(state.targets[TARGET_REPO].status, TargetStatus::Pending);
}

#[test]
fn test_no_pr_and_no_history_is_unknown() {
    let discoverer = GithubStateDiscoverer::new(Arc::new(MockGithub::new()));

    let state = discoverer
        .discover(&Context::background(), &simple_group("main"))
        .unwrap();

    let target = &state.targets[TARGET_REPO];
    assert_eq!(target.status, TargetStatus::Unknown);
    assert!(target.last_sync_commit.is_none());
    assert!(target.open_pr.is_none());
}

#[test]
fn test_unrelated_open_prs_are_ignored() {
    let github = MockGithub::new();
    github.open_prs.lock().unwrap().push(PullRequest {
        number: 3,
        title: "feature work".to_string(),
        body: "unrelated".to_string(),
        state: "open".to_string(),
        head_ref: "feature/new-widget".to_string(),
        base_ref: "main".to_string(),
        html_url: String::new(),
        mergeable: None,
    });
    let discoverer = GithubStateDiscoverer::new(Arc::new(github));

    let state = discoverer
        .discover(&Context::background(), &simple_group("main"))
        .unwrap();

    assert_eq!(state.targets[TARGET_REPO].status, TargetStatus::Unknown);
}
