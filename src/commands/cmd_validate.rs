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

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::{
    config,
    context::Context,
    ui::{
        self,
        table::{Alignment, Table},
    },
};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct CmdArgs {
    /// Also list every target with its mappings
    #[clap(long, default_value_t = false)]
    pub list_targets: bool,
}

pub fn run(_ctx: &Context, global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let config = config::load(&global_args.config)?;

    ui::cli::log!(
        "{} '{}'",
        "Valid configuration".bold().green(),
        global_args.config.display()
    );

    let mut table = Table::new_with_alignments(vec![
        Alignment::Left,
        Alignment::Left,
        Alignment::Right,
    ]);
    table.set_headers(vec![
        "Group".to_string(),
        "Source".to_string(),
        "Targets".to_string(),
    ]);
    for group in &config.groups {
        table.add_row(vec![
            group.id.clone(),
            format!("{}@{}", group.source.repo, group.source.branch),
            group.targets.len().to_string(),
        ]);
    }
    table.print();

    if args.list_targets {
        for group in &config.groups {
            ui::cli::log!();
            ui::cli::log!("Group '{}':", group.id);
            for target in &group.targets {
                ui::cli::log!(
                    "  {}@{} ({} file mappings, {} directory mappings)",
                    target.repo,
                    target.branch,
                    target.files.len(),
                    target.directories.len()
                );
            }
        }
    }

    Ok(())
}
