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

use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;

use crate::{
    config,
    context::Context,
    github::rest::RestGithub,
    global::defaults::SHORT_COMMIT_SHA_LEN,
    sync::state::{GithubStateDiscoverer, StateDiscoverer, TargetStatus},
    ui::{
        self,
        table::{Alignment, Table},
    },
    utils::short_sha,
};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct CmdArgs {
    /// Only show these groups (repeatable)
    #[clap(long = "group", value_parser)]
    pub groups: Vec<String>,
}

/// Shows where every target stands relative to the source, without
/// touching anything.
pub fn run(ctx: &Context, global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let config = config::load(&global_args.config)?;

    let token = global_args
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .ok_or_else(|| anyhow!("A GitHub token is required (--token or GITHUB_TOKEN)"))?;
    let github = Arc::new(RestGithub::new(token)?);
    let discoverer = GithubStateDiscoverer::new(github);

    for group in &config.groups {
        if !args.groups.is_empty() && !args.groups.iter().any(|g| g == &group.id) {
            continue;
        }
        ctx.check()?;

        let state = discoverer.discover(ctx, group)?;
        ui::cli::log!(
            "Group '{}': {}@{} at {}",
            group.id,
            state.source.repo,
            state.source.branch,
            short_sha(&state.source.latest_commit, SHORT_COMMIT_SHA_LEN)
        );

        let mut table = Table::new_with_alignments(vec![
            Alignment::Left,
            Alignment::Left,
            Alignment::Left,
            Alignment::Left,
        ]);
        table.set_headers(vec![
            "Target".to_string(),
            "Status".to_string(),
            "Last sync".to_string(),
            "Open PR".to_string(),
        ]);

        for target in &group.targets {
            let Some(target_state) = state.targets.get(&target.repo) else {
                continue;
            };
            let status = match target_state.status {
                TargetStatus::UpToDate => target_state.status.to_string().green().to_string(),
                TargetStatus::Conflict => target_state.status.to_string().red().to_string(),
                TargetStatus::Pending => target_state.status.to_string().yellow().to_string(),
                _ => target_state.status.to_string(),
            };
            table.add_row(vec![
                target.repo.clone(),
                status,
                target_state
                    .last_sync_commit
                    .as_deref()
                    .map(|sha| short_sha(sha, SHORT_COMMIT_SHA_LEN).to_string())
                    .unwrap_or_else(|| "-".to_string()),
                target_state
                    .open_pr
                    .as_ref()
                    .map(|pr| format!("#{}", pr.number))
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        table.print();
        ui::cli::log!();
    }

    Ok(())
}
