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

use anyhow::{Context as AnyhowContext, Result};
use glob::Pattern;

/// A compiled set of shell-style exclusion globs.
///
/// A pattern excludes a file when it matches either the file's path relative
/// to the directory mapping or its basename. Matching is case-sensitive.
/// This is the one exclusion rule used everywhere (directory walks and
/// config validation).
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn compile(globs: &[String]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(globs.len());
        for g in globs {
            let pattern = Pattern::new(g)
                .with_context(|| format!("Invalid exclusion pattern '{g}'"))?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if `rel_path` (forward-slash, relative to the mapping
    /// source) is excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
        self.patterns
            .iter()
            .any(|p| p.matches(rel_path) || p.matches(basename))
    }
}
