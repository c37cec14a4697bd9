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
    cache::{ContentCache, TreeCache, TreeCacheOptions},
    config::{DirectoryMapping, FileMapping, GroupConfig, ModuleConfig, SyncOptions},
    context::Context,
    github::GithubClient,
    sync::{
        SyncServices,
        orchestrator::{Orchestrator, SyncStatus},
        state::{SourceState, TargetState},
    },
};

use crate::integration_tests::{MockGit, MockGithub, SOURCE_COMMIT, SOURCE_REPO, TARGET_REPO, simple_group};

fn services(git: Arc<MockGit>, github: Arc<MockGithub>, options: SyncOptions) -> SyncServices {
    let github_dyn: Arc<dyn GithubClient> = github;
    SyncServices {
        git,
        github: github_dyn.clone(),
        trees: Arc::new(TreeCache::new(github_dyn, TreeCacheOptions::default())),
        contents: Arc::new(ContentCache::default()),
        options,
        generator: None,
    }
}

fn source_state() -> SourceState {
    SourceState {
        repo: SOURCE_REPO.to_string(),
        branch: "main".to_string(),
        latest_commit: SOURCE_COMMIT.to_string(),
    }
}

fn group_with_readme() -> GroupConfig {
    let mut group = simple_group("main");
    group.targets[0].files = vec![FileMapping {
        src: "README.md".to_string(),
        dest: "README.md".to_string(),
        delete: false,
    }];
    group
}

#[test]
fn test_completed_flow_pushes_and_opens_pr() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new content")]));
    let github = Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"old"));

    let mut group = group_with_readme();
    group.pr_global.reviewers = vec!["alice".to_string(), "sync-bot".to_string()];

    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);
    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );

    let report = orchestrator.execute(&Context::background());
    assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.message);
    assert!(report.pr_url.is_some());
    assert_eq!(report.files_changed, 1);

    // Exactly one push, not forced.
    let pushes = git.calls_matching("push");
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].ends_with("force=false"));

    // One PR, correct shape, reviewer self-filtered.
    let created = github.created_prs.lock().unwrap();
    assert_eq!(created.len(), 1);
    let spec = &created[0];
    assert_eq!(
        spec.title,
        "[Sync] Update project files from source repository (0123456)"
    );
    assert_eq!(spec.base, "main");
    assert!(spec.head.starts_with("chore/sync-files-default-"));
    assert_eq!(spec.reviewers, vec!["alice"]);
    assert!(spec.body.contains("<!-- cotorra-metadata"));
    assert!(spec.body.contains(&format!("source_commit: {SOURCE_COMMIT}")));
}

#[test]
fn test_up_to_date_target_is_skipped() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new content")]));
    let github = Arc::new(MockGithub::new());

    let group = group_with_readme();
    let services = services(git.clone(), github, SyncOptions::default());
    let mut state = TargetState::unknown(TARGET_REPO);
    state.last_sync_commit = Some(SOURCE_COMMIT.to_string());

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Skipped);
    assert!(git.calls_matching("clone").is_empty());
}

#[test]
fn test_no_changes_short_circuits_before_branching() {
    let git = Arc::new(MockGit::new(&[("README.md", b"same")]));
    let github = Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"same"));

    let group = group_with_readme();
    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::NoChanges);
    assert!(git.calls_matching("push").is_empty());
    assert!(github.created_prs.lock().unwrap().is_empty());
    // Only the source was cloned.
    assert_eq!(git.calls_matching("clone").len(), 1);
}

#[test]
fn test_clean_staged_tree_is_no_changes_to_sync() {
    let mut git = MockGit::new(&[("README.md", b"new content")]);
    git.clean_diff = true;
    let git = Arc::new(git);
    let github = Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"old"));

    let group = group_with_readme();
    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::NoChangesToSync);
    assert!(git.calls_matching("push").is_empty());
    assert!(github.created_prs.lock().unwrap().is_empty());
}

#[test]
fn test_dry_run_stages_but_never_pushes() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new content")]));
    let github = Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"old"));

    let group = group_with_readme();
    let options = SyncOptions {
        dry_run: true,
        ..Default::default()
    };
    let services = services(git.clone(), github.clone(), options);
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::DryRun);
    assert_eq!(report.files_changed, 1);
    // Both clones happened (accurate preview), but nothing left the machine.
    assert_eq!(git.calls_matching("clone").len(), 2);
    assert!(git.calls_matching("push").is_empty());
    assert!(github.created_prs.lock().unwrap().is_empty());
}

#[test]
fn test_existing_remote_branch_is_force_pushed_once() {
    let mut git = MockGit::new(&[("README.md", b"new content")]);
    git.reject_first_push = true;
    let git = Arc::new(git);
    let github = Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"old"));

    let group = group_with_readme();
    let services = services(git.clone(), github, SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.message);
    let pushes = git.calls_matching("push");
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].ends_with("force=true"));
}

#[test]
fn test_pr_validation_422_with_existing_open_pr() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new content")]));
    let mut github = MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"old");
    *github.validation_failures.lock().unwrap() = 1;
    github.synthesize_pr_on_422 = true;
    let github = Arc::new(github);

    let group = group_with_readme();
    let services = services(git, github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.message);
    // Flow diverted to an update: no successful create, no branch deletion.
    assert!(github.created_prs.lock().unwrap().is_empty());
    assert_eq!(github.updated_prs.lock().unwrap().len(), 1);
    assert!(github.deleted_branches.lock().unwrap().is_empty());
}

#[test]
fn test_pr_validation_422_without_existing_pr_retries_once() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new content")]));
    let mut github = MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"old");
    *github.validation_failures.lock().unwrap() = 1;
    let github = Arc::new(github);

    let group = group_with_readme();
    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.message);
    // The stale remote branch was dropped and creation retried.
    assert_eq!(github.deleted_branches.lock().unwrap().len(), 1);
    assert_eq!(github.created_prs.lock().unwrap().len(), 1);
    // Push happened twice: initial and the re-push before the retry.
    assert_eq!(git.calls_matching("push").len(), 2);
}

#[test]
fn test_file_deletion_mapping() {
    let git = Arc::new(MockGit::new(&[]));
    let github =
        Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "obsolete.txt", b"bye"));

    let mut group = simple_group("main");
    group.targets[0].files = vec![FileMapping {
        src: String::new(),
        dest: "obsolete.txt".to_string(),
        delete: true,
    }];

    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.message);
    assert_eq!(git.calls_matching("rm obsolete.txt").len(), 1);
    let created = github.created_prs.lock().unwrap();
    assert!(created[0].body.contains("files_deleted: 1"));
}

#[test]
fn test_module_linked_directory_resyncs_at_pinned_version() {
    let git = Arc::new(
        MockGit::new(&[("lib/go.mod", b"module github.com/org/lib\n"), ("lib/code.go", b"old code")])
            .with_fixture("org/lib", &[("code.go", b"v1 code"), ("go.mod", b"module github.com/org/lib\n")])
            .with_fixture(
                TARGET_REPO,
                &[("go.mod", b"module example.com/app\n\ngo 1.22\n\nrequire github.com/org/lib v1.2.3\n")],
            ),
    );
    let github = Arc::new(MockGithub::new().with_file(
        TARGET_REPO,
        "main",
        "go.mod",
        b"module example.com/app\n\ngo 1.22\n\nrequire github.com/org/lib v1.2.3\n",
    ));

    let mut group = simple_group("main");
    group.targets[0].directories = vec![DirectoryMapping {
        src: "lib".to_string(),
        dest: "lib".to_string(),
        exclude: vec!["go.mod".to_string()],
        delete: false,
        module: Some(ModuleConfig {
            name: "github.com/org/lib".to_string(),
            repo_url: "https://github.com/org/lib.git".to_string(),
            manifest: "go.mod".to_string(),
            subdir: None,
        }),
    }];

    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.message);
    // The module source was cloned at the version the target pins.
    let module_clones: Vec<String> = git
        .calls_matching("clone")
        .into_iter()
        .filter(|c| c.contains("org/lib"))
        .collect();
    assert_eq!(module_clones.len(), 1);
    assert!(module_clones[0].ends_with("v1.2.3"));

    // The synced content is the module's, not the source clone's.
    let created = github.created_prs.lock().unwrap();
    assert!(created[0].body.contains("lib/code.go"));
}

#[test]
fn test_misspelled_base_branch_fails_before_pr_creation() {
    let git = Arc::new(MockGit::new(&[("README.md", b"new content")]));
    let mut github = MockGithub::new().with_file(TARGET_REPO, "main", "README.md", b"old");
    // The configured base does not exist remotely.
    github.branches.retain(|b| b.name != "main");
    let github = Arc::new(github);

    let group = group_with_readme();
    let services = services(git, github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Failed);
    assert!(report.message.unwrap().contains("pull request"));
    // The typed failure happened before any PR mutation.
    assert!(github.created_prs.lock().unwrap().is_empty());
    assert!(github.updated_prs.lock().unwrap().is_empty());
}

#[test]
fn test_directory_delete_mapping_removes_target_files() {
    let git = Arc::new(MockGit::new(&[]));
    let mut github = MockGithub::new()
        .with_file(TARGET_REPO, "main", "legacy/a.txt", b"a")
        .with_file(TARGET_REPO, "main", "legacy/sub/b.txt", b"b");
    github.tree_paths = vec![
        "legacy/a.txt".to_string(),
        "legacy/sub/b.txt".to_string(),
        "kept.txt".to_string(),
    ];
    let github = Arc::new(github);

    let mut group = simple_group("main");
    group.targets[0].directories = vec![DirectoryMapping {
        src: String::new(),
        dest: "legacy".to_string(),
        exclude: Vec::new(),
        delete: true,
        module: None,
    }];

    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.message);
    // Both files under the mapping were removed, the sibling kept.
    let removals = git.calls_matching("rm ");
    assert_eq!(removals.len(), 1);
    assert!(removals[0].contains("legacy/a.txt"));
    assert!(removals[0].contains("legacy/sub/b.txt"));
    assert!(!removals[0].contains("kept.txt"));

    let created = github.created_prs.lock().unwrap();
    assert!(created[0].body.contains("files_deleted: 2"));
}

#[test]
fn test_empty_delete_directory_is_no_changes_not_failure() {
    let git = Arc::new(MockGit::new(&[]));
    // The target tree has nothing under the mapping's destination.
    let github = Arc::new(MockGithub::new());

    let mut group = simple_group("main");
    group.targets[0].directories = vec![DirectoryMapping {
        src: String::new(),
        dest: "legacy".to_string(),
        exclude: Vec::new(),
        delete: true,
        module: None,
    }];

    let services = services(git.clone(), github.clone(), SyncOptions::default());
    let state = TargetState::unknown(TARGET_REPO);

    let source = source_state();
    let orchestrator = Orchestrator::new(
        &services,
        &group,
        &group.targets[0],
        &source,
        &state,
    );
    let report = orchestrator.execute(&Context::background());

    assert_eq!(report.status, SyncStatus::NoChanges, "{:?}", report.message);
    assert!(git.calls_matching("rm ").is_empty());
    assert!(git.calls_matching("push").is_empty());
    assert!(github.created_prs.lock().unwrap().is_empty());
}
