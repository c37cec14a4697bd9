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

use anyhow::{Result, anyhow};
use clap::Args;

use crate::{
    cache::{ContentCache, TreeCache, TreeCacheOptions},
    config::{self, SyncOptions},
    context::Context,
    git::system::SystemGit,
    github::{GithubClient, rest::RestGithub},
    global::defaults,
    sync::{
        SyncServices,
        engine::Engine,
        state::GithubStateDiscoverer,
    },
    ui,
    utils::format_count,
};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct CmdArgs {
    /// Only sync these target repositories (repeatable)
    #[clap(long = "target", value_parser)]
    pub targets: Vec<String>,

    /// Sync targets even when they are up to date
    #[clap(long, default_value_t = false)]
    pub force: bool,

    /// Clone and stage but never push or open PRs
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,

    /// Number of targets synced in parallel (0 = pick from CPU count)
    #[clap(long, default_value_t = 0)]
    pub max_concurrency: usize,

    /// Also refresh targets that already have an open sync PR
    #[clap(long, default_value_t = false)]
    pub update_existing_prs: bool,

    /// Keep scratch directories for inspection
    #[clap(long, default_value_t = false)]
    pub keep_temp_files: bool,

    /// Label PRs for automerge
    #[clap(long, default_value_t = false)]
    pub automerge: bool,

    /// Labels applied when automerge is enabled (repeatable)
    #[clap(long = "automerge-label", value_parser)]
    pub automerge_labels: Vec<String>,

    /// File processor worker threads (0 = default)
    #[clap(long, default_value_t = 0)]
    pub workers: usize,

    /// Abort the whole run after this many seconds
    #[clap(long, value_parser)]
    pub timeout: Option<u64>,
}

pub fn run(ctx: &Context, global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let config = config::load(&global_args.config)?;

    let token = global_args
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .ok_or_else(|| anyhow!("A GitHub token is required (--token or GITHUB_TOKEN)"))?;
    let github: Arc<dyn GithubClient> = Arc::new(RestGithub::new(token)?);

    let max_concurrency = if args.max_concurrency == 0 {
        num_cpus::get().min(defaults::DEFAULT_MAX_CONCURRENCY)
    } else {
        args.max_concurrency
    };

    let options = SyncOptions {
        force: args.force,
        dry_run: args.dry_run,
        max_concurrency,
        update_existing_prs: args.update_existing_prs,
        cleanup_temp_files: !args.keep_temp_files,
        automerge: args.automerge,
        automerge_labels: args.automerge_labels.clone(),
        workers: args.workers,
    };

    let services = Arc::new(SyncServices {
        git: Arc::new(SystemGit::new()),
        github: github.clone(),
        trees: Arc::new(TreeCache::new(github.clone(), TreeCacheOptions::default())),
        contents: Arc::new(ContentCache::default()),
        options,
        generator: None,
    });

    let discoverer = Arc::new(GithubStateDiscoverer::new(github));
    let engine = Engine::new(services, config, discoverer);

    let run_ctx = match args.timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx.clone(),
    };

    let report = engine.sync(&run_ctx, &args.targets)?;
    ui::cli::log!(
        "Synced {}",
        format_count(report.targets.len(), "target", "targets")
    );
    Ok(())
}
