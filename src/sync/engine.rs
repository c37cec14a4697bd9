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

use std::{sync::Arc, time::Duration};

use anyhow::{Result, bail};
use colored::Colorize;

use crate::{
    config::{GroupConfig, SyncConfig, TargetConfig},
    context::Context,
    global::defaults,
    sync::{
        SyncError, SyncServices,
        orchestrator::{Orchestrator, SyncStatus, TargetReport},
        state::{StateDiscoverer, SyncState, TargetState, TargetStatus},
    },
    ui::{
        cli,
        table::{Alignment, Table},
    },
    utils::pretty_print_duration,
    vlog,
};

/// Aggregated outcome of one engine run.
#[derive(Debug, Default)]
pub struct EngineReport {
    pub targets: Vec<TargetReport>,
    pub failures: usize,
}

/// Runs the per-target orchestrators through a bounded worker pool and
/// aggregates their outcomes. One failing target never cancels siblings.
pub struct Engine {
    services: Arc<SyncServices>,
    config: SyncConfig,
    discoverer: Arc<dyn StateDiscoverer>,
}

impl Engine {
    pub fn new(
        services: Arc<SyncServices>,
        config: SyncConfig,
        discoverer: Arc<dyn StateDiscoverer>,
    ) -> Self {
        Self {
            services,
            config,
            discoverer,
        }
    }

    /// Syncs every eligible target of every group. `target_filter` narrows
    /// the run to the named repositories; a filter matching no eligible
    /// target is a hard error.
    pub fn sync(&self, ctx: &Context, target_filter: &[String]) -> Result<EngineReport> {
        let mut report = EngineReport::default();

        for group in &self.config.groups {
            ctx.check()?;
            cli::log!("Syncing group '{}' ({} targets)", group.id, group.targets.len());

            let state = self.discoverer.discover(ctx, group)?;
            let selected = filter_targets(group, &state, target_filter, self.services.as_ref())?;
            if selected.is_empty() {
                cli::log!("Group '{}': every target is up to date", group.id);
                continue;
            }

            let outcomes = self.run_pool(ctx, group, &state, selected);
            report.targets.extend(outcomes);
        }

        report.failures = report
            .targets
            .iter()
            .filter(|t| t.status == SyncStatus::Failed)
            .count();

        // Metrics still get flushed after cancellation, on a short detached
        // budget.
        let flush_ctx = Context::detached(Duration::from_secs(defaults::METRICS_FLUSH_TIMEOUT_SECS));
        self.flush_summary(&flush_ctx, &report);

        if report.failures > 0 {
            bail!(
                "completed with {} failures out of {} targets",
                report.failures,
                report.targets.len()
            );
        }
        Ok(report)
    }

    /// Bounded pool: at most `max_concurrency` orchestrators at once.
    /// Workers stop pulling new targets once the context is done; running
    /// orchestrators notice at their next suspension point.
    fn run_pool<'a>(
        &'a self,
        ctx: &Context,
        group: &'a GroupConfig,
        state: &'a SyncState,
        selected: Vec<(&'a TargetConfig, &'a TargetState)>,
    ) -> Vec<TargetReport> {
        let workers = self
            .services
            .options
            .max_concurrency
            .clamp(1, selected.len());

        let (work_tx, work_rx) =
            crossbeam_channel::bounded::<(&TargetConfig, &TargetState)>(selected.len());
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<TargetReport>();

        for item in selected {
            // Bounded to the full length; sends cannot block here.
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let done_tx = done_tx.clone();
                let worker_ctx = ctx.clone();
                s.spawn(move || {
                    for (target, target_state) in work_rx.iter() {
                        if worker_ctx.is_done() {
                            // No new orchestrators start after cancellation.
                            break;
                        }
                        let orchestrator = Orchestrator::new(
                            self.services.as_ref(),
                            group,
                            target,
                            &state.source,
                            target_state,
                        );
                        let report = orchestrator.execute(&worker_ctx);
                        if done_tx.send(report).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);

            let mut reports = Vec::new();
            for report in done_rx.iter() {
                vlog!(
                    "{}: {} in {}",
                    report.repo,
                    report.status,
                    pretty_print_duration(report.duration)
                );
                reports.push(report);
            }
            reports
        })
    }

    fn flush_summary(&self, ctx: &Context, report: &EngineReport) {
        if ctx.is_done() || report.targets.is_empty() {
            return;
        }

        let mut table = Table::new_with_alignments(vec![
            Alignment::Left,
            Alignment::Left,
            Alignment::Right,
            Alignment::Left,
        ]);
        table.set_headers(vec![
            "Target".to_string(),
            "Status".to_string(),
            "Files".to_string(),
            "PR".to_string(),
        ]);
        for target in &report.targets {
            let status = match target.status {
                SyncStatus::Completed => target.status.to_string().green().to_string(),
                SyncStatus::Failed => target.status.to_string().red().to_string(),
                _ => target.status.to_string(),
            };
            table.add_row(vec![
                target.repo.clone(),
                status,
                target.files_changed.to_string(),
                target.pr_url.clone().unwrap_or_default(),
            ]);
        }
        cli::log!();
        if crate::global::global_opts().as_ref().unwrap().verbosity > 0 {
            table.print();
        }

        let tree_stats = self.services.trees.stats();
        vlog!(
            "Tree cache: {} hits, {} misses, {} API calls saved, avg tree size {:.0}",
            tree_stats.hits,
            tree_stats.misses,
            tree_stats.api_calls_saved,
            tree_stats.average_tree_size
        );
        let content_stats = self.services.contents.stats();
        vlog!(
            "Content cache: {} hits, {} misses, {} entries",
            content_stats.hits,
            content_stats.misses,
            content_stats.entries
        );
    }
}

/// Applies the eligibility rules: explicit filter, conflict warnings,
/// up-to-date skips and the `pending` gate.
fn filter_targets<'a>(
    group: &'a GroupConfig,
    state: &'a SyncState,
    target_filter: &[String],
    services: &SyncServices,
) -> Result<Vec<(&'a TargetConfig, &'a TargetState)>, SyncError> {
    let mut selected = Vec::new();

    for target in &group.targets {
        if !target_filter.is_empty() && !target_filter.iter().any(|f| f == &target.repo) {
            continue;
        }

        let Some(target_state) = state.targets.get(&target.repo) else {
            // Discovery produced nothing for this target; treat as unknown.
            continue;
        };

        match target_state.status {
            TargetStatus::Conflict => {
                cli::log_warning(&format!(
                    "{}: open sync PR has conflicts, skipping (resolve manually)",
                    target.repo
                ));
                continue;
            }
            TargetStatus::UpToDate if !services.options.force => {
                vlog!("{}: up to date", target.repo);
                continue;
            }
            TargetStatus::Pending
                if !services.options.update_existing_prs && !services.options.force =>
            {
                vlog!("{}: sync PR already open, skipping", target.repo);
                continue;
            }
            _ => {}
        }

        selected.push((target, target_state));
    }

    if selected.is_empty() && !target_filter.is_empty() {
        return Err(SyncError::TargetNotMatchingFilter(target_filter.join(", ")));
    }

    Ok(selected)
}
