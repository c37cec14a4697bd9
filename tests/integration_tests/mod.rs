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

//! Shared in-memory doubles for the git driver and the GitHub client, plus
//! helpers for building configs and states.

mod test_directory;
mod test_engine;
mod test_orchestrator;
mod test_processor;
mod test_state;

use std::{
    collections::BTreeMap,
    path::Path,
    sync::Mutex,
};

use cotorra::{
    config::{GroupConfig, SourceConfig, TargetConfig},
    context::Context,
    git::{CloneOptions, GitDriver, GitError},
    github::{
        Branch, Commit, GitTree, GithubClient, GithubError, PrState, PullRequest,
        PullRequestSpec, PullRequestUpdate, RepoFile, TreeEntry, TreeEntryKind, User,
    },
};

pub(crate) const SOURCE_REPO: &str = "org/source";
pub(crate) const TARGET_REPO: &str = "org/target";
pub(crate) const SOURCE_COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

/// Git double. Clones materialize the fixture matching the URL; anything
/// else produces an empty working tree. Every operation is appended to
/// `calls` for assertions.
pub(crate) struct MockGit {
    /// `(url fragment, files)` materialized when a clone URL matches.
    pub clone_fixtures: Vec<(String, BTreeMap<String, Vec<u8>>)>,
    /// Pretend the staged tree is clean (forces no_changes_to_sync).
    pub clean_diff: bool,
    /// First push is rejected as an existing branch.
    pub reject_first_push: bool,
    /// Every clone fails.
    pub fail_clones: bool,
    pub calls: Mutex<Vec<String>>,
    push_attempts: Mutex<u32>,
}

impl MockGit {
    pub fn new(source_files: &[(&str, &[u8])]) -> Self {
        Self {
            clone_fixtures: vec![(
                SOURCE_REPO.to_string(),
                source_files
                    .iter()
                    .map(|(path, content)| (path.to_string(), content.to_vec()))
                    .collect(),
            )],
            clean_diff: false,
            reject_first_push: false,
            fail_clones: false,
            calls: Mutex::new(Vec::new()),
            push_attempts: Mutex::new(0),
        }
    }

    pub fn with_fixture(mut self, url_fragment: &str, files: &[(&str, &[u8])]) -> Self {
        self.clone_fixtures.push((
            url_fragment.to_string(),
            files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_vec()))
                .collect(),
        ));
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl GitDriver for MockGit {
    fn clone_repo(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        opts: &CloneOptions,
    ) -> Result<(), GitError> {
        self.clone_with_branch(ctx, url, path, "default", opts)
    }

    fn clone_with_branch(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        branch: &str,
        _opts: &CloneOptions,
    ) -> Result<(), GitError> {
        ctx.check()?;
        if self.fail_clones {
            return Err(GitError::CommandFailed {
                command: "clone".to_string(),
                stderr: "could not resolve host".to_string(),
            });
        }
        self.record(format!("clone {url} {branch}"));
        std::fs::create_dir_all(path)?;
        for (fragment, files) in &self.clone_fixtures {
            if !url.contains(fragment) {
                continue;
            }
            for (rel, content) in files {
                let full = path.join(rel);
                std::fs::create_dir_all(full.parent().unwrap())?;
                std::fs::write(full, content)?;
            }
        }
        Ok(())
    }

    fn clone_at_tag(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        tag: &str,
        opts: &CloneOptions,
    ) -> Result<(), GitError> {
        self.clone_with_branch(ctx, url, path, tag, opts)
    }

    fn checkout(&self, ctx: &Context, _path: &Path, rev: &str) -> Result<(), GitError> {
        ctx.check()?;
        self.record(format!("checkout {rev}"));
        Ok(())
    }

    fn create_branch(&self, ctx: &Context, _path: &Path, name: &str) -> Result<(), GitError> {
        ctx.check()?;
        self.record(format!("branch {name}"));
        Ok(())
    }

    fn add(&self, ctx: &Context, _path: &Path, pathspecs: &[String]) -> Result<(), GitError> {
        ctx.check()?;
        self.record(format!("add {}", pathspecs.join(" ")));
        Ok(())
    }

    fn commit(&self, ctx: &Context, _path: &Path, message: &str) -> Result<(), GitError> {
        ctx.check()?;
        if self.clean_diff {
            return Err(GitError::NoChanges);
        }
        self.record(format!("commit {message}"));
        Ok(())
    }

    fn current_commit_sha(&self, ctx: &Context, _path: &Path) -> Result<String, GitError> {
        ctx.check()?;
        Ok("fedcba9876543210fedcba9876543210fedcba98".to_string())
    }

    fn changed_files(&self, ctx: &Context, _path: &Path) -> Result<Vec<String>, GitError> {
        ctx.check()?;
        Ok(Vec::new())
    }

    fn batch_remove_files(
        &self,
        ctx: &Context,
        path: &Path,
        paths: &[String],
        _cached: bool,
    ) -> Result<(), GitError> {
        ctx.check()?;
        if !paths.is_empty() {
            self.record(format!("rm {}", paths.join(" ")));
        }
        for rel in paths {
            let _ = std::fs::remove_file(path.join(rel));
        }
        Ok(())
    }

    fn push(
        &self,
        ctx: &Context,
        _path: &Path,
        remote: &str,
        branch: &str,
        force: bool,
    ) -> Result<(), GitError> {
        ctx.check()?;
        let mut attempts = self.push_attempts.lock().unwrap();
        *attempts += 1;
        if self.reject_first_push && *attempts == 1 && !force {
            return Err(GitError::BranchAlreadyExists(branch.to_string()));
        }
        self.record(format!("push {remote} {branch} force={force}"));
        Ok(())
    }

    fn diff_ignore_whitespace(
        &self,
        ctx: &Context,
        _path: &Path,
        staged: bool,
    ) -> Result<String, GitError> {
        ctx.check()?;
        if self.clean_diff {
            return Ok(String::new());
        }
        self.record(format!("diff staged={staged}"));
        Ok("diff --git a/file b/file\n".to_string())
    }
}

/// GitHub double with per-call recording.
pub(crate) struct MockGithub {
    /// `(repo, branch, path) → content`
    pub files: BTreeMap<(String, String, String), Vec<u8>>,
    pub branches: Vec<Branch>,
    pub tree_paths: Vec<String>,
    pub open_prs: Mutex<Vec<PullRequest>>,
    /// Next PR creations that fail with HTTP 422.
    pub validation_failures: Mutex<u32>,
    /// When a creation 422s, register an open PR on the same head, the way
    /// a duplicate-head rejection implies one exists.
    pub synthesize_pr_on_422: bool,
    pub get_file_calls: Mutex<Vec<(String, String, String)>>,
    pub created_prs: Mutex<Vec<PullRequestSpec>>,
    pub updated_prs: Mutex<Vec<(u64, PullRequestUpdate)>>,
    pub deleted_branches: Mutex<Vec<String>>,
    next_pr_number: Mutex<u64>,
}

impl MockGithub {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            branches: vec![
                Branch {
                    name: "main".to_string(),
                    sha: SOURCE_COMMIT.to_string(),
                },
                Branch {
                    name: "development".to_string(),
                    sha: SOURCE_COMMIT.to_string(),
                },
            ],
            tree_paths: Vec::new(),
            open_prs: Mutex::new(Vec::new()),
            validation_failures: Mutex::new(0),
            synthesize_pr_on_422: false,
            get_file_calls: Mutex::new(Vec::new()),
            created_prs: Mutex::new(Vec::new()),
            updated_prs: Mutex::new(Vec::new()),
            deleted_branches: Mutex::new(Vec::new()),
            next_pr_number: Mutex::new(100),
        }
    }

    pub fn with_file(mut self, repo: &str, branch: &str, path: &str, content: &[u8]) -> Self {
        self.files.insert(
            (repo.to_string(), branch.to_string(), path.to_string()),
            content.to_vec(),
        );
        self
    }

    pub fn file_lookups(&self) -> Vec<(String, String, String)> {
        self.get_file_calls.lock().unwrap().clone()
    }
}

impl GithubClient for MockGithub {
    fn get_file(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        rev: &str,
    ) -> Result<RepoFile, GithubError> {
        ctx.check()?;
        assert!(!rev.is_empty(), "get_file called with an empty ref");
        self.get_file_calls.lock().unwrap().push((
            repo.to_string(),
            path.to_string(),
            rev.to_string(),
        ));
        match self
            .files
            .get(&(repo.to_string(), rev.to_string(), path.to_string()))
        {
            Some(content) => Ok(RepoFile {
                path: path.to_string(),
                sha: format!("sha-{path}"),
                content: content.clone(),
            }),
            None => Err(GithubError::NotFound {
                resource: format!("{repo}:{path}@{rev}"),
            }),
        }
    }

    fn get_commit(&self, ctx: &Context, _repo: &str, _rev: &str) -> Result<Commit, GithubError> {
        ctx.check()?;
        Ok(Commit {
            sha: SOURCE_COMMIT.to_string(),
        })
    }

    fn get_git_tree(
        &self,
        ctx: &Context,
        _repo: &str,
        sha: &str,
        _recursive: bool,
    ) -> Result<GitTree, GithubError> {
        ctx.check()?;
        Ok(GitTree {
            sha: sha.to_string(),
            truncated: false,
            entries: self
                .tree_paths
                .iter()
                .map(|p| TreeEntry {
                    path: p.clone(),
                    kind: TreeEntryKind::Blob,
                    sha: format!("sha-{p}"),
                    size: Some(1),
                })
                .collect(),
        })
    }

    fn list_branches(&self, ctx: &Context, _repo: &str) -> Result<Vec<Branch>, GithubError> {
        ctx.check()?;
        Ok(self.branches.clone())
    }

    fn get_branch(&self, ctx: &Context, repo: &str, name: &str) -> Result<Branch, GithubError> {
        ctx.check()?;
        self.branches
            .iter()
            .find(|b| b.name == name)
            .cloned()
            .ok_or_else(|| GithubError::NotFound {
                resource: format!("{repo}/branches/{name}"),
            })
    }

    fn delete_branch(&self, ctx: &Context, _repo: &str, name: &str) -> Result<(), GithubError> {
        ctx.check()?;
        self.deleted_branches.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn list_pull_requests(
        &self,
        ctx: &Context,
        _repo: &str,
        state: PrState,
    ) -> Result<Vec<PullRequest>, GithubError> {
        ctx.check()?;
        match state {
            PrState::Open | PrState::All => Ok(self.open_prs.lock().unwrap().clone()),
            PrState::Closed => Ok(Vec::new()),
        }
    }

    fn create_pull_request(
        &self,
        ctx: &Context,
        _repo: &str,
        spec: &PullRequestSpec,
    ) -> Result<PullRequest, GithubError> {
        ctx.check()?;
        {
            let mut failures = self.validation_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                if self.synthesize_pr_on_422 {
                    let mut number = self.next_pr_number.lock().unwrap();
                    *number += 1;
                    self.open_prs.lock().unwrap().push(PullRequest {
                        number: *number,
                        title: "previous sync".to_string(),
                        body: String::new(),
                        state: "open".to_string(),
                        head_ref: spec.head.clone(),
                        base_ref: spec.base.clone(),
                        html_url: format!(
                            "https://github.com/{TARGET_REPO}/pull/{}",
                            *number
                        ),
                        mergeable: Some(true),
                    });
                }
                return Err(GithubError::ValidationFailed(
                    "head already has a pull request".to_string(),
                ));
            }
        }
        self.created_prs.lock().unwrap().push(spec.clone());

        let mut number = self.next_pr_number.lock().unwrap();
        *number += 1;
        Ok(PullRequest {
            number: *number,
            title: spec.title.clone(),
            body: spec.body.clone(),
            state: "open".to_string(),
            head_ref: spec.head.clone(),
            base_ref: spec.base.clone(),
            html_url: format!("https://github.com/{TARGET_REPO}/pull/{}", *number),
            mergeable: Some(true),
        })
    }

    fn get_pull_request(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, GithubError> {
        ctx.check()?;
        self.open_prs
            .lock()
            .unwrap()
            .iter()
            .find(|pr| pr.number == number)
            .cloned()
            .ok_or_else(|| GithubError::NotFound {
                resource: format!("{repo}/pulls/{number}"),
            })
    }

    fn update_pull_request(
        &self,
        ctx: &Context,
        _repo: &str,
        number: u64,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, GithubError> {
        ctx.check()?;
        self.updated_prs
            .lock()
            .unwrap()
            .push((number, update.clone()));
        let prs = self.open_prs.lock().unwrap();
        let existing = prs.iter().find(|pr| pr.number == number);
        Ok(PullRequest {
            number,
            title: existing.map(|pr| pr.title.clone()).unwrap_or_default(),
            body: update.body.clone().unwrap_or_default(),
            state: "open".to_string(),
            head_ref: existing.map(|pr| pr.head_ref.clone()).unwrap_or_default(),
            base_ref: existing.map(|pr| pr.base_ref.clone()).unwrap_or_default(),
            html_url: format!("https://github.com/{TARGET_REPO}/pull/{number}"),
            mergeable: Some(true),
        })
    }

    fn current_user(&self, ctx: &Context) -> Result<User, GithubError> {
        ctx.check()?;
        Ok(User {
            login: "sync-bot".to_string(),
        })
    }
}

/// A group with one source and one target, ready to be tweaked.
pub(crate) fn simple_group(target_branch: &str) -> GroupConfig {
    GroupConfig {
        id: "default".to_string(),
        name: "Default".to_string(),
        source: SourceConfig {
            repo: SOURCE_REPO.to_string(),
            branch: "main".to_string(),
            ..Default::default()
        },
        targets: vec![TargetConfig {
            repo: TARGET_REPO.to_string(),
            branch: target_branch.to_string(),
            ..Default::default()
        }],
        ..Default::default()
    }
}
