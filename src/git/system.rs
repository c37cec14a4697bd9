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
    process::{Command, Output},
};

use crate::context::Context;

use super::{CloneOptions, GitDriver, GitError};

/// Git driver that shells out to the system `git` binary.
pub struct SystemGit {
    program: String,
}

impl SystemGit {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    fn run(&self, ctx: &Context, cwd: Option<&Path>, args: &[&str]) -> Result<Output, GitError> {
        ctx.check()?;

        let mut cmd = Command::new(&self.program);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        // Never prompt for credentials from a worker thread.
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.args(args);

        let output = cmd.output()?;
        ctx.check()?;
        Ok(output)
    }

    fn run_checked(
        &self,
        ctx: &Context,
        cwd: Option<&Path>,
        args: &[&str],
    ) -> Result<Output, GitError> {
        let output = self.run(ctx, cwd, args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(GitError::CommandFailed {
                command: args.first().unwrap_or(&"git").to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn clone_args<'a>(url: &'a str, path: &'a str, opts: &CloneOptions) -> Vec<String> {
        let mut args = vec!["clone".to_string()];
        if let Some(depth) = opts.depth {
            args.push(format!("--depth={depth}"));
        }
        if let Some(limit) = opts.blob_size_limit {
            args.push(format!("--filter=blob:limit={limit}"));
        }
        args.push(url.to_string());
        args.push(path.to_string());
        args
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl GitDriver for SystemGit {
    fn clone_repo(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        opts: &CloneOptions,
    ) -> Result<(), GitError> {
        let path_str = path.to_string_lossy().to_string();
        let args = Self::clone_args(url, &path_str, opts);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_checked(ctx, None, &arg_refs)?;
        Ok(())
    }

    fn clone_with_branch(
        &self,
        ctx: &Context,
        url: &str,
        path: &Path,
        branch: &str,
        opts: &CloneOptions,
    ) -> Result<(), GitError> {
        let path_str = path.to_string_lossy().to_string();
        let mut args = Self::clone_args(url, &path_str, opts);
        args.insert(1, format!("--branch={branch}"));
        args.insert(2, "--single-branch".to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_checked(ctx, None, &arg_refs)?;
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
        // Tags clone the same way branches do; `--branch` accepts both.
        self.clone_with_branch(ctx, url, path, tag, opts)
    }

    fn checkout(&self, ctx: &Context, path: &Path, rev: &str) -> Result<(), GitError> {
        self.run_checked(ctx, Some(path), &["checkout", rev])?;
        Ok(())
    }

    fn create_branch(&self, ctx: &Context, path: &Path, name: &str) -> Result<(), GitError> {
        let output = self.run(ctx, Some(path), &["checkout", "-b", name])?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("already exists") {
            return Err(GitError::BranchAlreadyExists(name.to_string()));
        }
        Err(GitError::CommandFailed {
            command: "checkout -b".to_string(),
            stderr: stderr.trim().to_string(),
        })
    }

    fn add(&self, ctx: &Context, path: &Path, pathspecs: &[String]) -> Result<(), GitError> {
        let mut args = vec!["add", "--"];
        args.extend(pathspecs.iter().map(String::as_str));
        self.run_checked(ctx, Some(path), &args)?;
        Ok(())
    }

    fn commit(&self, ctx: &Context, path: &Path, message: &str) -> Result<(), GitError> {
        let output = self.run(ctx, Some(path), &["commit", "-m", message])?;
        if output.status.success() {
            return Ok(());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("nothing to commit") || stderr.contains("nothing to commit") {
            return Err(GitError::NoChanges);
        }
        Err(GitError::CommandFailed {
            command: "commit".to_string(),
            stderr: stderr.trim().to_string(),
        })
    }

    fn current_commit_sha(&self, ctx: &Context, path: &Path) -> Result<String, GitError> {
        let output = self.run_checked(ctx, Some(path), &["rev-parse", "HEAD"])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn changed_files(&self, ctx: &Context, path: &Path) -> Result<Vec<String>, GitError> {
        // A root commit has no HEAD~1 to diff against; list what the
        // commit itself introduced instead.
        let parent = self.run(ctx, Some(path), &["rev-parse", "--verify", "HEAD~1"])?;
        let output = if parent.status.success() {
            self.run_checked(ctx, Some(path), &["diff", "--name-only", "HEAD~1", "HEAD"])?
        } else {
            self.run_checked(
                ctx,
                Some(path),
                &["show", "--name-only", "--pretty=format:", "HEAD"],
            )?
        };
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn batch_remove_files(
        &self,
        ctx: &Context,
        path: &Path,
        paths: &[String],
        cached: bool,
    ) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rm", "--ignore-unmatch"];
        if cached {
            args.push("--cached");
        }
        args.push("--");
        args.extend(paths.iter().map(String::as_str));
        self.run_checked(ctx, Some(path), &args)?;
        Ok(())
    }

    fn push(
        &self,
        ctx: &Context,
        path: &Path,
        remote: &str,
        branch: &str,
        force: bool,
    ) -> Result<(), GitError> {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.push(remote);
        args.push(branch);

        let output = self.run(ctx, Some(path), &args)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Non-fast-forward rejections mean the remote branch already exists
        // with diverged history.
        if stderr.contains("non-fast-forward") || stderr.contains("fetch first") {
            return Err(GitError::BranchAlreadyExists(branch.to_string()));
        }
        Err(GitError::CommandFailed {
            command: "push".to_string(),
            stderr: stderr.trim().to_string(),
        })
    }

    fn diff_ignore_whitespace(
        &self,
        ctx: &Context,
        path: &Path,
        staged: bool,
    ) -> Result<String, GitError> {
        let mut args = vec!["diff", "--ignore-all-space"];
        if staged {
            args.push("--staged");
        }
        let output = self.run_checked(ctx, Some(path), &args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
