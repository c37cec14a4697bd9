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
    path::Path,
    time::{Duration, Instant},
};

use chrono::Utc;
use colored::Colorize;

use crate::{
    config::{GroupConfig, TargetConfig},
    context::Context,
    git::{CloneOptions, GitError},
    github::{GithubError, PrState, PullRequest, PullRequestSpec, PullRequestUpdate},
    global::{defaults, repo_clone_url},
    gomod::{self, ModuleUpdate},
    processor::{BatchProcessor, DirectoryProcessor, FileChange, FileJob, ProcessError},
    resolver::{ConflictResolver, ConflictStrategy, SourceFileInfo, detect_conflicts},
    sync::{
        SyncError, SyncServices,
        branch::{generate_branch_name, is_sync_branch},
        metrics::PerformanceMetrics,
        pr::{
            ChangeSummary, PrMetadata, assemble_pr_lists, pr_title, render_body,
            static_commit_message,
        },
        scratch::ScratchDir,
        state::{SourceState, TargetState},
    },
    ui::{cli, sync_progress::SyncProgressReporter},
    vlog,
};

/// Terminal state of one target sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Target already carries the latest source commit.
    Skipped,
    /// The pipeline produced zero changes.
    NoChanges,
    /// Changes evaporated at staging time (target already matched).
    NoChangesToSync,
    /// Everything staged and committed locally, push withheld.
    DryRun,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, SyncStatus::Failed)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Skipped => "skipped",
            SyncStatus::NoChanges => "no_changes",
            SyncStatus::NoChangesToSync => "no_changes_to_sync",
            SyncStatus::DryRun => "dry_run",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Outcome handed back to the engine.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub repo: String,
    pub status: SyncStatus,
    pub message: Option<String>,
    pub pr_url: Option<String>,
    pub files_changed: usize,
    pub duration: Duration,
}

/// Drives one target through clone → process → stage → commit → push → PR.
/// Instantiated per target per engine run and not reused.
pub struct Orchestrator<'a> {
    services: &'a SyncServices,
    group: &'a GroupConfig,
    target: &'a TargetConfig,
    source: &'a SourceState,
    target_state: &'a TargetState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        services: &'a SyncServices,
        group: &'a GroupConfig,
        target: &'a TargetConfig,
        source: &'a SourceState,
        target_state: &'a TargetState,
    ) -> Self {
        Self {
            services,
            group,
            target,
            source,
            target_state,
        }
    }

    /// Runs the pipeline, folding every failure into the report.
    pub fn execute(&self, ctx: &Context) -> TargetReport {
        let started = Instant::now();
        match self.run(ctx, started) {
            Ok(report) => report,
            Err(err) => {
                if err.is_context_error() {
                    cli::log_warning(&format!("Sync of {} interrupted: {err}", self.target.repo));
                } else {
                    cli::log_error(&format!("Sync of {} failed: {err}", self.target.repo));
                }
                TargetReport {
                    repo: self.target.repo.clone(),
                    status: SyncStatus::Failed,
                    message: Some(err.to_string()),
                    pr_url: None,
                    files_changed: 0,
                    duration: started.elapsed(),
                }
            }
        }
    }

    fn report(&self, status: SyncStatus, started: Instant) -> TargetReport {
        TargetReport {
            repo: self.target.repo.clone(),
            status,
            message: None,
            pr_url: None,
            files_changed: 0,
            duration: started.elapsed(),
        }
    }

    fn run(&self, ctx: &Context, started: Instant) -> Result<TargetReport, SyncError> {
        ctx.check()?;

        // Skip targets that already carry the latest source commit.
        if !self.services.options.force
            && self.target_state.last_sync_commit.as_deref()
                == Some(self.source.latest_commit.as_str())
        {
            vlog!("{}: up to date, skipping", self.target.repo);
            return Ok(self.report(SyncStatus::Skipped, started));
        }

        self.cleanup_orphan_branches(ctx);

        let scratch = ScratchDir::create(None, self.services.options.cleanup_temp_files)
            .map_err(|e| SyncError::Other(e.to_string()))?;

        let source_dir = scratch
            .subdir("source")
            .map_err(|e| SyncError::Other(e.to_string()))?;
        let clone_opts = CloneOptions {
            blob_size_limit: self.group.source.blob_size_limit,
            depth: Some(1),
        };
        let step = Instant::now();
        self.services
            .git
            .clone_with_branch(
                ctx,
                &repo_clone_url(&self.source.repo),
                &source_dir,
                &self.source.branch,
                &clone_opts,
            )
            .and_then(|_| {
                self.services
                    .git
                    .checkout(ctx, &source_dir, &self.source.latest_commit)
            })
            .map_err(|source| SyncError::SourceCloneFailed {
                repo: self.source.repo.clone(),
                source,
            })?;
        vlog!(
            "{}: source cloned in {}",
            self.target.repo,
            crate::utils::pretty_print_duration(step.elapsed())
        );

        let reporter = SyncProgressReporter::new(&self.target.repo);
        let batch = BatchProcessor::new(
            self.services.github.clone(),
            self.services.contents.clone(),
            self.source.repo.clone(),
            self.target.repo.clone(),
            self.target.branch.clone(),
            self.services.options.workers,
        );
        let metrics = PerformanceMetrics::new();

        let step = Instant::now();
        let mut changes = self.process_file_mappings(ctx, &batch, &source_dir, &reporter)?;
        let module_updates = {
            let (dir_changes, updates) = self.process_directory_mappings(
                ctx,
                &batch,
                &source_dir,
                &scratch,
                &metrics,
                &reporter,
            )?;
            changes.extend(dir_changes);
            updates
        };
        reporter.finalize();
        vlog!(
            "{}: processed mappings in {}",
            self.target.repo,
            crate::utils::pretty_print_duration(step.elapsed())
        );

        if changes.is_empty() {
            cli::log!("{}: no changes", self.target.repo);
            return Ok(self.report(SyncStatus::NoChanges, started));
        }

        let deleted = changes.iter().filter(|c| c.is_deleted).count();
        metrics.add_total_files(changes.len() as u64);
        metrics.add_files_deleted(deleted as u64);
        let batch_stats = batch.stats();
        metrics.add_cache_hits(batch_stats.cache_hits);
        metrics.add_api_calls_saved(batch_stats.api_calls_saved);

        let branch_name = generate_branch_name(
            self.group.effective_branch_prefix(),
            &self.group.id,
            Utc::now(),
            &self.source.latest_commit,
        );

        let mut summary = ChangeSummary {
            group_id: self.group.id.clone(),
            group_name: self.group.name.clone(),
            source_repo: self.source.repo.clone(),
            source_commit: self.source.latest_commit.clone(),
            target_repo: self.target.repo.clone(),
            changed_paths: changes.iter().map(|c| c.path.clone()).collect(),
            files_deleted: deleted as u64,
            security_email: self.group.source.security_email.clone(),
            support_email: self.group.source.support_email.clone(),
        };

        let (sync_commit, ai_commit_message) = match self.commit_changes(
            ctx,
            &scratch,
            &branch_name,
            &changes,
            &module_updates,
            &mut summary,
        )? {
            Some(result) => result,
            None => {
                cli::log!("{}: nothing left to sync after staging", self.target.repo);
                return Ok(self.report(SyncStatus::NoChangesToSync, started));
            }
        };

        let files_changed = summary.changed_paths.len();

        if self.services.options.dry_run {
            cli::log!(
                "{}: dry run, would push {} as {}",
                self.target.repo,
                crate::utils::format_count(files_changed, "change", "changes"),
                branch_name
            );
            let mut report = self.report(SyncStatus::DryRun, started);
            report.files_changed = files_changed;
            return Ok(report);
        }

        self.push_branch(ctx, &scratch, &branch_name)?;

        let ai_body = self
            .services
            .generator
            .as_ref()
            .and_then(|g| g.pr_body(&summary));
        let meta = PrMetadata {
            group_id: self.group.id.clone(),
            group_name: self.group.name.clone(),
            source_repo: self.source.repo.clone(),
            source_commit: self.source.latest_commit.clone(),
            target_repo: self.target.repo.clone(),
            sync_commit,
            sync_time: Utc::now(),
            staged_repo_available: true,
            changed_files_count: files_changed,
            files_with_original_content: changes
                .iter()
                .filter(|c| c.original_content.is_some())
                .count(),
            files_without_original_content: changes
                .iter()
                .filter(|c| c.original_content.is_none())
                .count(),
            ai_commit_message,
            ai_pr_body: ai_body.is_some(),
            directories: metrics.directory_snapshot(),
            total_files: metrics.total_files(),
            files_deleted: metrics.files_deleted(),
            api_calls_saved: metrics.api_calls_saved(),
            cache_hits: metrics.cache_hits(),
        };
        let body = render_body(ai_body, &summary, &meta);

        let pr = self.create_or_update_pr(ctx, &scratch, &branch_name, body)?;
        cli::log!(
            "{}: {} ({})",
            self.target.repo,
            "synced".bold().green(),
            pr.html_url
        );

        let mut report = self.report(SyncStatus::Completed, started);
        report.pr_url = Some(pr.html_url);
        report.files_changed = files_changed;
        Ok(report)
    }

    /// Deletes sync branches that lost their PR. Best-effort: failures are
    /// logged and never abort the pipeline.
    fn cleanup_orphan_branches(&self, ctx: &Context) {
        let branches = match self.services.github.list_branches(ctx, &self.target.repo) {
            Ok(branches) => branches,
            Err(e) => {
                cli::log_warning(&format!(
                    "Could not list branches of {}: {e}",
                    self.target.repo
                ));
                return;
            }
        };

        let prefix = self.group.effective_branch_prefix();
        let open_head = self
            .target_state
            .open_pr
            .as_ref()
            .map(|pr| pr.head_ref.as_str());

        for branch in branches {
            if !is_sync_branch(&branch.name, prefix) || Some(branch.name.as_str()) == open_head {
                continue;
            }
            match self
                .services
                .github
                .delete_branch(ctx, &self.target.repo, &branch.name)
            {
                Ok(()) => vlog!("{}: removed orphan branch {}", self.target.repo, branch.name),
                Err(e) => cli::log_warning(&format!(
                    "Could not delete orphan branch {} of {}: {e}",
                    branch.name, self.target.repo
                )),
            }
        }
    }

    /// Step 4: standalone file mappings, conflict-resolved, through the
    /// batch processor. Deletions mirror the directory delete path for
    /// single files.
    fn process_file_mappings(
        &self,
        ctx: &Context,
        batch: &BatchProcessor,
        source_dir: &Path,
        reporter: &SyncProgressReporter,
    ) -> Result<Vec<FileChange>, SyncError> {
        let entries: Vec<SourceFileInfo> = self
            .target
            .files
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.delete)
            .map(|(index, m)| SourceFileInfo {
                source_id: m.src.clone(),
                src: m.src.clone(),
                dest: m.dest.clone(),
                mapping_index: index,
            })
            .collect();

        let strategy = match &self.group.conflict_resolution {
            Some(c) => ConflictStrategy::from_config(&c.strategy, c.priority.clone()),
            None => ConflictStrategy::LastWins,
        };
        let winners = ConflictResolver::new(strategy).resolve(&detect_conflicts(&entries))?;

        let mut jobs = Vec::new();
        let mut delete_changes = Vec::new();

        for (index, mapping) in self.target.files.iter().enumerate() {
            if mapping.delete {
                match batch.fetch_existing(ctx, &mapping.dest) {
                    Ok(Some(original)) => {
                        delete_changes
                            .push(FileChange::deleted(mapping.dest.clone(), Some(original)));
                    }
                    Ok(None) => {
                        vlog!(
                            "{}: '{}' already absent, nothing to delete",
                            self.target.repo,
                            mapping.dest
                        );
                    }
                    Err(ProcessError::Context(c)) => return Err(SyncError::Context(c)),
                    Err(e) => {
                        cli::log_warning(&format!(
                            "Could not fetch '{}' before deletion: {e}",
                            mapping.dest
                        ));
                        delete_changes.push(FileChange::deleted(mapping.dest.clone(), None));
                    }
                }
                continue;
            }

            if let Some(winner) = winners.get(&mapping.dest)
                && winner.mapping_index != index
            {
                vlog!(
                    "{}: '{}' superseded by '{}' (conflict resolution)",
                    self.target.repo,
                    mapping.src,
                    winner.source_id
                );
                continue;
            }

            jobs.push(FileJob::new(
                &mapping.src,
                &mapping.dest,
                self.target.transform.clone(),
            ));
        }

        let mut changes = batch
            .process_files_with_reporter(ctx, source_dir, jobs, Some(reporter))
            .map_err(|e| match e {
                ProcessError::Context(c) => SyncError::Context(c),
                other => SyncError::FileProcessingFailed(other),
            })?;
        changes.extend(delete_changes);
        Ok(changes)
    }

    /// Step 5: directory mappings. One failing mapping is logged; only all
    /// of them failing aborts, wrapping the first cause.
    fn process_directory_mappings(
        &self,
        ctx: &Context,
        batch: &BatchProcessor,
        source_dir: &Path,
        scratch: &ScratchDir,
        metrics: &PerformanceMetrics,
        reporter: &SyncProgressReporter,
    ) -> Result<(Vec<FileChange>, Vec<ModuleUpdate>), SyncError> {
        let total = self.target.directories.len();
        if total == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let dir_proc = DirectoryProcessor {
            batch,
            trees: self.services.trees.as_ref(),
            git: self.services.git.as_ref(),
            target: self.target,
            temp_base: scratch.path(),
        };

        let mut changes = Vec::new();
        let mut module_updates = Vec::new();
        let mut failures: Vec<ProcessError> = Vec::new();

        for mapping in &self.target.directories {
            match dir_proc.process_mapping(ctx, source_dir, mapping, Some(reporter)) {
                Ok(outcome) => {
                    metrics.record_directory(outcome.metrics);
                    changes.extend(outcome.changes);
                    if let Some(update) = outcome.module_update {
                        module_updates.push(update);
                    }
                }
                // The target already holds the desired state; zero changes,
                // not a failure.
                Err(ProcessError::NothingToDelete(dest)) => {
                    vlog!(
                        "{}: no files under '{dest}' to delete",
                        self.target.repo
                    );
                }
                Err(e) => {
                    cli::log_warning(&format!(
                        "Directory mapping '{}' of {} failed: {e}",
                        mapping.src, self.target.repo
                    ));
                    failures.push(e);
                }
            }
        }

        if failures.len() == total {
            return Err(SyncError::AllDirectoriesFailed {
                count: total,
                first: failures.remove(0),
            });
        }
        Ok((changes, module_updates))
    }

    /// Step 8: clone the target (full blobs, configured branch), stage the
    /// change set and commit. Returns `None` when staging shows a clean
    /// tree; otherwise `(sync commit SHA, commit message was AI)`.
    fn commit_changes(
        &self,
        ctx: &Context,
        scratch: &ScratchDir,
        branch_name: &str,
        changes: &[FileChange],
        module_updates: &[ModuleUpdate],
        summary: &mut ChangeSummary,
    ) -> Result<Option<(String, bool)>, SyncError> {
        let git = self.services.git.as_ref();
        let target_dir = scratch
            .subdir("target")
            .map_err(|e| SyncError::Other(e.to_string()))?;

        // Blob filtering stays off: the PR diff is computed against this
        // clone, and it must come from the configured target branch, not a
        // stale sync branch.
        git.clone_with_branch(
            ctx,
            &repo_clone_url(&self.target.repo),
            &target_dir,
            &self.target.branch,
            &CloneOptions::default(),
        )
        .map_err(SyncError::CommitFailed)?;

        match git.create_branch(ctx, &target_dir, branch_name) {
            Err(GitError::BranchAlreadyExists(_)) => git
                .checkout(ctx, &target_dir, branch_name)
                .map_err(SyncError::CommitFailed)?,
            other => other.map_err(SyncError::CommitFailed)?,
        }

        self.apply_changes(ctx, &target_dir, changes)?;
        self.apply_module_updates(&target_dir, module_updates)?;

        git.add(ctx, &target_dir, &[".".to_string()])
            .map_err(SyncError::CommitFailed)?;

        let staged = git
            .diff_ignore_whitespace(ctx, &target_dir, true)
            .map_err(SyncError::CommitFailed)?;
        if staged.trim().is_empty() {
            return Ok(None);
        }

        let ai_message = self
            .services
            .generator
            .as_ref()
            .and_then(|g| g.commit_message(summary));
        let ai_commit_message = ai_message.is_some();
        let message = ai_message.unwrap_or_else(|| static_commit_message(summary));

        match git.commit(ctx, &target_dir, &message) {
            Err(GitError::NoChanges) => return Ok(None),
            other => other.map_err(SyncError::CommitFailed)?,
        }

        let sync_commit = git
            .current_commit_sha(ctx, &target_dir)
            .map_err(SyncError::CommitFailed)?;
        // The committed paths are authoritative for the PR description.
        let actual = git
            .changed_files(ctx, &target_dir)
            .map_err(SyncError::CommitFailed)?;
        if !actual.is_empty() {
            summary.changed_paths = actual;
        }

        Ok(Some((sync_commit, ai_commit_message)))
    }

    fn apply_changes(
        &self,
        ctx: &Context,
        target_dir: &Path,
        changes: &[FileChange],
    ) -> Result<(), SyncError> {
        let deletions: Vec<String> = changes
            .iter()
            .filter(|c| c.is_deleted)
            .map(|c| c.path.clone())
            .collect();
        self.services
            .git
            .batch_remove_files(ctx, target_dir, &deletions, false)
            .map_err(SyncError::CommitFailed)?;

        for change in changes.iter().filter(|c| !c.is_deleted) {
            ctx.check()?;
            let Some(content) = &change.content else {
                continue;
            };
            let full = target_dir.join(&change.path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SyncError::CommitFailed(GitError::Io(e)))?;
                set_dir_mode(parent);
            }
            std::fs::write(&full, content)
                .map_err(|e| SyncError::CommitFailed(GitError::Io(e)))?;
            set_file_mode(&full);
        }
        Ok(())
    }

    fn apply_module_updates(
        &self,
        target_dir: &Path,
        updates: &[ModuleUpdate],
    ) -> Result<(), SyncError> {
        for update in updates {
            let manifest_path = target_dir.join(&update.dest_path);
            let Ok(text) = std::fs::read_to_string(&manifest_path) else {
                cli::log_warning(&format!(
                    "{}: manifest '{}' missing from clone, skipping module rewrite",
                    self.target.repo, update.dest_path
                ));
                continue;
            };

            let rewritten = if gomod::manifest::pinned_version(&text, &update.module).is_some() {
                let (updated, modified) =
                    gomod::manifest::update_dependency(&text, &update.module, &update.version)
                        .map_err(|e| SyncError::Other(e.to_string()))?;
                if !modified {
                    continue;
                }
                updated
            } else {
                gomod::manifest::add_dependency(&text, &update.module, &update.version)
                    .map_err(|e| SyncError::Other(e.to_string()))?
            };

            std::fs::write(&manifest_path, rewritten)
                .map_err(|e| SyncError::CommitFailed(GitError::Io(e)))?;
        }
        Ok(())
    }

    /// Step 9: push, force-pushing once to reconcile a surviving remote
    /// branch that state discovery missed.
    fn push_branch(
        &self,
        ctx: &Context,
        scratch: &ScratchDir,
        branch_name: &str,
    ) -> Result<(), SyncError> {
        let target_dir = scratch.path().join("target");
        match self.services.git.push(
            ctx,
            &target_dir,
            defaults::DEFAULT_GIT_REMOTE,
            branch_name,
            false,
        ) {
            Err(GitError::BranchAlreadyExists(_)) => {
                cli::log_warning(&format!(
                    "{}: remote branch {branch_name} already exists, force-pushing",
                    self.target.repo
                ));
                self.services
                    .git
                    .push(
                        ctx,
                        &target_dir,
                        defaults::DEFAULT_GIT_REMOTE,
                        branch_name,
                        true,
                    )
                    .map_err(SyncError::PushFailed)
            }
            other => other.map_err(SyncError::PushFailed),
        }
    }

    /// Steps 10–11: update the known open PR on this branch, or create a
    /// new one with 422 recovery.
    fn create_or_update_pr(
        &self,
        ctx: &Context,
        scratch: &ScratchDir,
        branch_name: &str,
        body: String,
    ) -> Result<PullRequest, SyncError> {
        if let Some(existing) = &self.target_state.open_pr
            && existing.head_ref == branch_name
        {
            // Body refresh only; the title never churns.
            return self
                .services
                .github
                .update_pull_request(
                    ctx,
                    &self.target.repo,
                    existing.number,
                    &PullRequestUpdate {
                        title: None,
                        body: Some(body),
                    },
                )
                .map_err(SyncError::PrUpdateFailed);
        }

        self.create_new_pr(ctx, scratch, branch_name, body)
    }

    fn create_new_pr(
        &self,
        ctx: &Context,
        scratch: &ScratchDir,
        branch_name: &str,
        body: String,
    ) -> Result<PullRequest, SyncError> {
        // The base must exist before any mutation.
        let base = self.resolve_base_branch(ctx)?;

        let current_user = match self.services.github.current_user(ctx) {
            Ok(user) => Some(user.login),
            Err(e) => {
                cli::log_warning(&format!("Could not resolve the authenticated user: {e}"));
                None
            }
        };
        let lists = assemble_pr_lists(
            self.group,
            self.target,
            current_user.as_deref(),
            self.services.options.automerge,
            &self.services.options.automerge_labels,
        );

        let spec = PullRequestSpec {
            title: pr_title(&self.source.latest_commit),
            body: body.clone(),
            head: branch_name.to_string(),
            base,
            assignees: lists.assignees,
            labels: lists.labels,
            reviewers: lists.reviewers,
            team_reviewers: lists.team_reviewers,
        };

        match self
            .services
            .github
            .create_pull_request(ctx, &self.target.repo, &spec)
        {
            Ok(pr) => Ok(pr),
            Err(GithubError::ValidationFailed(msg)) => {
                cli::log_warning(&format!(
                    "{}: PR creation rejected ({}), probing for an existing PR",
                    self.target.repo,
                    msg.trim()
                ));
                self.recover_from_validation_failure(ctx, scratch, branch_name, body, &spec)
            }
            Err(e) => Err(SyncError::PrCreateFailed(e)),
        }
    }

    /// HTTP-422 recovery: reuse a PR that already rides this head, else
    /// delete the remote branch, push it fresh and retry creation once.
    fn recover_from_validation_failure(
        &self,
        ctx: &Context,
        scratch: &ScratchDir,
        branch_name: &str,
        body: String,
        spec: &PullRequestSpec,
    ) -> Result<PullRequest, SyncError> {
        let open = self
            .services
            .github
            .list_pull_requests(ctx, &self.target.repo, PrState::Open)
            .map_err(SyncError::PrCreateFailed)?;

        if let Some(existing) = open.into_iter().find(|pr| pr.head_ref == branch_name) {
            return self
                .services
                .github
                .update_pull_request(
                    ctx,
                    &self.target.repo,
                    existing.number,
                    &PullRequestUpdate {
                        title: None,
                        body: Some(body),
                    },
                )
                .map_err(SyncError::PrUpdateFailed);
        }

        if let Err(e) = self
            .services
            .github
            .delete_branch(ctx, &self.target.repo, branch_name)
        {
            cli::log_warning(&format!(
                "Could not delete remote branch {branch_name}: {e}"
            ));
        }
        // Re-push the head and retry once; the pushed branch survives even
        // if this final attempt fails.
        self.push_branch(ctx, scratch, branch_name)?;
        self.services
            .github
            .create_pull_request(ctx, &self.target.repo, spec)
            .map_err(SyncError::PrCreateFailed)
    }

    /// Validates the configured base branch, falling back to an
    /// auto-detected default only when none is configured.
    fn resolve_base_branch(&self, ctx: &Context) -> Result<String, SyncError> {
        if !self.target.branch.is_empty() {
            return self
                .services
                .github
                .get_branch(ctx, &self.target.repo, &self.target.branch)
                .map(|b| b.name)
                .map_err(SyncError::PrCreateFailed);
        }
        for candidate in ["main", "master"] {
            if let Ok(branch) = self
                .services
                .github
                .get_branch(ctx, &self.target.repo, candidate)
            {
                return Ok(branch.name);
            }
        }
        Err(SyncError::PrCreateFailed(GithubError::NotFound {
            resource: format!("{}/branches", self.target.repo),
        }))
    }
}

#[cfg(unix)]
fn set_dir_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o750));
}

#[cfg(unix)]
fn set_file_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) {}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) {}
