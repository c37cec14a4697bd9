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

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod cmd_status;
pub mod cmd_sync;
pub mod cmd_validate;

// CLI arguments
#[derive(Parser, Debug)]
#[clap(
    version = env!("CARGO_PKG_VERSION"), // Version from crate metadata
    about = "Multi-repository file broadcast tool"
)]
pub struct Cli {
    // Subcommand
    #[command(subcommand)]
    pub command: Command,

    // Global arguments
    #[clap(flatten)]
    pub global_args: GlobalArgs,
}

// List of commands
#[derive(Subcommand, Debug)]
pub enum Command {
    #[clap(about = "Broadcast files from the source repository to every target")]
    Sync(cmd_sync::CmdArgs),

    #[clap(about = "Show how far each target is behind the source")]
    Status(cmd_status::CmdArgs),

    #[clap(about = "Check the configuration file")]
    Validate(cmd_validate::CmdArgs),
}

#[derive(Parser, Debug)]
pub struct GlobalArgs {
    /// Configuration file
    #[clap(short, long, value_parser, default_value = "cotorra.json")]
    pub config: PathBuf,

    /// GitHub token. Falls back to the GITHUB_TOKEN environment variable.
    #[clap(long, value_parser)]
    pub token: Option<String>,

    /// Suppress all non-error output
    #[clap(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Output verbosity
    #[clap(short, long, value_parser)]
    pub verbosity: Option<u32>,
}
