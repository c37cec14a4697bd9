/*
 * cotorra is a multi-repository file broadcast tool
 * Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cotorra::commands::{self, Cli};
use cotorra::context::Context;
use cotorra::{global, ui};

fn run(ctx: &Context, args: &Cli) -> Result<()> {
    match &args.command {
        commands::Command::Sync(cmd_args) => {
            commands::cmd_sync::run(ctx, &args.global_args, cmd_args)
        }
        commands::Command::Status(cmd_args) => {
            commands::cmd_status::run(ctx, &args.global_args, cmd_args)
        }
        commands::Command::Validate(cmd_args) => {
            commands::cmd_validate::run(ctx, &args.global_args, cmd_args)
        }
    }
}

fn main() {
    let args = Cli::parse();
    global::set_global_opts_with_args(&args.global_args);

    let (ctx, handle) = Context::cancellable();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        ui::cli::log_warning(&format!("Could not install the interrupt handler: {e}"));
    }

    if let Err(e) = run(&ctx, &args) {
        ui::cli::log_error(e.to_string().as_str());
        std::process::exit(1);
    }

    ui::cli::log!("{}", "Finished".bold().green());
}
