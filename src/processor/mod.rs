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

pub mod binary;
pub mod directory;
pub mod job;

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use thiserror::Error;

use crate::{
    cache::ContentCache,
    config::TransformConfig,
    context::{Context, ContextError},
    github::{GithubClient, GithubError},
    global::defaults,
    transform::{
        RecoveryStrategy, RepoNameTransformer, TransformChain, TransformContext, TransformError,
        VariableTransformer,
    },
    ui::{cli, progress::ProgressReporter},
};

pub use binary::is_binary;
pub use directory::{DirectoryOutcome, DirectoryProcessor};
pub use job::{FileChange, FileJob};

#[derive(Debug, Error)]
pub enum ProcessError {
    /// The source file is missing from the working tree. Filtered silently
    /// by the collector.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A delete mapping found nothing under its destination. Benign: the
    /// target is already in the desired state.
    #[error("no files under '{0}' to delete")]
    NothingToDelete(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("transform failed for '{path}': {source}")]
    Transform {
        path: String,
        source: TransformError,
    },

    #[error("remote lookup failed for '{path}': {source}")]
    Remote { path: String, source: GithubError },

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Per-run counters the orchestrator folds into its metrics.
#[derive(Debug, Default, Clone)]
pub struct BatchStats {
    pub cache_hits: u64,
    pub api_calls_saved: u64,
}

/// Bounded worker pool that turns [`FileJob`]s into [`FileChange`]s.
///
/// Jobs are fanned out over a bounded channel to worker threads and results
/// fanned back in to a collector that filters and deduplicates. Workers see
/// jobs in unspecified order. One failing job never stops the others; only
/// cancellation aborts the batch.
pub struct BatchProcessor {
    github: Arc<dyn GithubClient>,
    contents: Arc<ContentCache>,
    source_repo: String,
    target_repo: String,
    target_branch: String,
    workers: usize,
    cache_hits: AtomicU64,
    api_calls_saved: AtomicU64,
}

impl BatchProcessor {
    pub fn new(
        github: Arc<dyn GithubClient>,
        contents: Arc<ContentCache>,
        source_repo: String,
        target_repo: String,
        target_branch: String,
        workers: usize,
    ) -> Self {
        assert!(
            !target_branch.is_empty(),
            "batch processor requires the configured target branch"
        );
        Self {
            github,
            contents,
            source_repo,
            target_repo,
            target_branch,
            workers: effective_workers(workers),
            cache_hits: AtomicU64::new(0),
            api_calls_saved: AtomicU64::new(0),
        }
    }

    /// Worker count; zero falls back to the default.
    pub fn set_workers(&mut self, workers: usize) {
        self.workers = effective_workers(workers);
    }

    pub fn stats(&self) -> BatchStats {
        BatchStats {
            cache_hits: self.cache_hits.load(Ordering::SeqCst),
            api_calls_saved: self.api_calls_saved.load(Ordering::SeqCst),
        }
    }

    pub fn process_files(
        &self,
        ctx: &Context,
        source_root: &Path,
        jobs: Vec<FileJob>,
    ) -> Result<Vec<FileChange>, ProcessError> {
        self.process_files_with_reporter(ctx, source_root, jobs, None)
    }

    /// Runs the batch, reporting progress as results arrive. An empty batch
    /// returns immediately without any remote call.
    pub fn process_files_with_reporter(
        &self,
        ctx: &Context,
        source_root: &Path,
        jobs: Vec<FileJob>,
        reporter: Option<&dyn ProgressReporter>,
    ) -> Result<Vec<FileChange>, ProcessError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let total = jobs.len();
        let workers = self.workers.min(total);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<FileJob>(workers * 2);
        let (result_tx, result_rx) =
            crossbeam_channel::bounded::<(String, Result<Option<FileChange>, ProcessError>)>(
                workers * 2,
            );

        std::thread::scope(|s| {
            // Feeder thread. Stops handing out jobs as soon as the context
            // is done.
            let feeder_ctx = ctx.clone();
            s.spawn(move || {
                for job in jobs {
                    if feeder_ctx.is_done() {
                        break;
                    }
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
                drop(job_tx); // Signal workers that no more jobs will come
            });

            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move || {
                    for job in job_rx.iter() {
                        let dest = job.dest_path.clone();
                        let result = self.process_one(ctx, source_root, &job, reporter);
                        if result_tx.send((dest, result)).is_err() {
                            break;
                        }
                    }
                });
            }

            // The collector owns the remaining channel ends.
            drop(job_rx);
            drop(result_tx);

            let mut changes: BTreeMap<String, FileChange> = BTreeMap::new();
            let mut fatal: Option<ProcessError> = None;
            let mut processed = 0usize;

            for (dest, result) in result_rx.iter() {
                processed += 1;
                if let Some(rep) = reporter {
                    rep.update_progress(processed, total, &dest);
                }

                match result {
                    Ok(Some(change)) => {
                        if let Some(enhanced) = reporter.and_then(|r| r.enhanced()) {
                            enhanced.record_file_changed();
                        }
                        changes.insert(change.path.clone(), change);
                    }
                    Ok(None) => {}
                    // Missing sources are dropped without noise.
                    Err(ProcessError::FileNotFound(_)) => {}
                    Err(err @ ProcessError::Context(_)) => {
                        if fatal.is_none() {
                            fatal = Some(err);
                        }
                    }
                    Err(err) => {
                        cli::log_warning(&format!("Skipping '{dest}': {err}"));
                    }
                }
            }

            if let Some(err) = fatal {
                return Err(err);
            }
            ctx.check()?;
            Ok(changes.into_values().collect())
        })
    }

    fn process_one(
        &self,
        ctx: &Context,
        source_root: &Path,
        job: &FileJob,
        reporter: Option<&dyn ProgressReporter>,
    ) -> Result<Option<FileChange>, ProcessError> {
        ctx.check()?;

        let full_path = source_root.join(&job.source_path);
        let content = match std::fs::read(&full_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProcessError::FileNotFound(job.source_path.clone()));
            }
            Err(e) => {
                return Err(ProcessError::Io {
                    path: job.source_path.clone(),
                    source: e,
                });
            }
        };

        let binary = is_binary(&content);
        if binary {
            crate::vlog!(
                "Binary file '{}' ({}), transform skipped",
                job.dest_path,
                crate::utils::format_size(content.len() as u64)
            );
            if let Some(enhanced) = reporter.and_then(|r| r.enhanced()) {
                enhanced.record_binary_file_skipped(content.len() as u64);
            }
        }

        let existing = self.fetch_existing(ctx, &job.dest_path)?;

        let new_content = if binary || !job.transform.is_enabled() {
            content
        } else {
            match self.apply_transforms(ctx, job, &content, reporter)? {
                Some(transformed) => transformed,
                None => return Ok(None), // transform decided to skip the file
            }
        };

        match existing {
            Some(existing) if existing == new_content => Ok(None),
            Some(existing) => Ok(Some(FileChange::modified(
                job.dest_path.clone(),
                new_content,
                existing,
            ))),
            None => Ok(Some(FileChange::created(job.dest_path.clone(), new_content))),
        }
    }

    /// Target content lookup, cache first. `None` means the file does not
    /// exist in the target at the configured branch.
    pub(crate) fn fetch_existing(
        &self,
        ctx: &Context,
        path: &str,
    ) -> Result<Option<Vec<u8>>, ProcessError> {
        if let Some(cached) = self
            .contents
            .get(&self.target_repo, &self.target_branch, path)
        {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            self.api_calls_saved.fetch_add(1, Ordering::Relaxed);
            return Ok(Some((*cached).clone()));
        }

        match self
            .github
            .get_file(ctx, &self.target_repo, path, &self.target_branch)
        {
            Ok(file) => {
                self.contents.put(
                    &self.target_repo,
                    &self.target_branch,
                    path,
                    file.content.clone(),
                );
                Ok(Some(file.content))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(GithubError::Context(c)) => Err(ProcessError::Context(c)),
            Err(e) => Err(ProcessError::Remote {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    /// Runs the transform chain with the per-category fallback strategy.
    /// `Ok(None)` drops the file from the batch.
    fn apply_transforms(
        &self,
        ctx: &Context,
        job: &FileJob,
        content: &[u8],
        reporter: Option<&dyn ProgressReporter>,
    ) -> Result<Option<Vec<u8>>, ProcessError> {
        // Content that is not valid UTF-8 behaves like a binary file: the
        // source bytes pass through untouched.
        let Ok(text) = std::str::from_utf8(content) else {
            return Ok(Some(content.to_vec()));
        };

        let chain = build_chain(&job.transform);
        let tctx = TransformContext {
            source_repo: self.source_repo.clone(),
            target_repo: self.target_repo.clone(),
            file_path: job.dest_path.clone(),
            variables: job.transform.variables.clone(),
        };

        let started = Instant::now();
        let mut result = chain.apply(text, &tctx);

        if let Err(e) = &result
            && e.recovery_strategy() == RecoveryStrategy::Retry
        {
            ctx.check()?;
            result = chain.apply(text, &tctx);
        }

        match result {
            Ok(transformed) => {
                if let Some(enhanced) = reporter.and_then(|r| r.enhanced()) {
                    enhanced.record_transform_success(started.elapsed());
                }
                Ok(Some(transformed.into_bytes()))
            }
            Err(e) => {
                if let Some(enhanced) = reporter.and_then(|r| r.enhanced()) {
                    enhanced.record_transform_error();
                }
                match e.recovery_strategy() {
                    RecoveryStrategy::None => Err(ProcessError::Transform {
                        path: job.dest_path.clone(),
                        source: e,
                    }),
                    RecoveryStrategy::SkipFile => Ok(None),
                    // Retry already happened; fall back to the original.
                    RecoveryStrategy::Retry | RecoveryStrategy::UseOriginal => {
                        cli::log_warning(&format!(
                            "Transform failed for '{}', keeping original content: {e}",
                            job.dest_path
                        ));
                        Ok(Some(content.to_vec()))
                    }
                }
            }
        }
    }
}

fn effective_workers(workers: usize) -> usize {
    if workers == 0 {
        defaults::DEFAULT_PROCESS_WORKERS
    } else {
        workers
    }
}

fn build_chain(config: &TransformConfig) -> TransformChain {
    let mut chain = TransformChain::new();
    if config.repo_name {
        chain.push(Box::new(RepoNameTransformer));
    }
    if !config.variables.is_empty() {
        chain.push(Box::new(VariableTransformer));
    }
    chain
}
