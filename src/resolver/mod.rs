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

use std::collections::BTreeMap;

use thiserror::Error;

use crate::ui::cli;

/// One source mapping to a destination path.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFileInfo {
    /// Identifier priority lists refer to (the mapping's source path).
    pub source_id: String,
    pub src: String,
    pub dest: String,
    /// Position of the mapping in configuration order.
    pub mapping_index: usize,
}

/// Two or more sources writing the same destination file.
#[derive(Debug, Clone)]
pub struct FileConflict {
    pub dest: String,
    pub sources: Vec<SourceFileInfo>,
}

#[derive(Debug, Error)]
#[error("conflict detected: {count} sources map to '{dest}'")]
pub struct ConflictError {
    pub dest: String,
    pub count: usize,
}

/// How a destination collision picks its winner. Contents are never merged.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictStrategy {
    /// Highest mapping index wins.
    LastWins,
    /// First list entry present among the conflicting sources wins;
    /// falls back to last-wins when none is present.
    Priority(Vec<String>),
    /// Refuse to sync the destination.
    Error,
}

impl ConflictStrategy {
    /// Parses the configured strategy name. Unknown names degrade to
    /// last-wins with a warning.
    pub fn from_config(strategy: &str, priority: Vec<String>) -> Self {
        match strategy {
            "last-wins" => ConflictStrategy::LastWins,
            "priority" => ConflictStrategy::Priority(priority),
            "error" => ConflictStrategy::Error,
            other => {
                cli::log_warning(&format!(
                    "Unknown conflict resolution strategy '{other}', using last-wins"
                ));
                ConflictStrategy::LastWins
            }
        }
    }
}

/// Groups mappings by destination; only groups of two or more are conflicts.
pub fn detect_conflicts(entries: &[SourceFileInfo]) -> Vec<FileConflict> {
    let mut by_dest: BTreeMap<&str, Vec<&SourceFileInfo>> = BTreeMap::new();
    for entry in entries {
        by_dest.entry(&entry.dest).or_default().push(entry);
    }

    by_dest
        .into_iter()
        .filter(|(_, sources)| sources.len() >= 2)
        .map(|(dest, sources)| FileConflict {
            dest: dest.to_string(),
            sources: sources.into_iter().cloned().collect(),
        })
        .collect()
}

pub struct ConflictResolver {
    strategy: ConflictStrategy,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self { strategy }
    }

    /// Picks a winner per destination. A single-source "conflict" returns
    /// that source unchanged.
    pub fn resolve(
        &self,
        conflicts: &[FileConflict],
    ) -> Result<BTreeMap<String, SourceFileInfo>, ConflictError> {
        let mut winners = BTreeMap::new();

        for conflict in conflicts {
            if conflict.sources.is_empty() {
                continue;
            }
            if conflict.sources.len() == 1 {
                winners.insert(conflict.dest.clone(), conflict.sources[0].clone());
                continue;
            }

            let winner = match &self.strategy {
                ConflictStrategy::Error => {
                    return Err(ConflictError {
                        dest: conflict.dest.clone(),
                        count: conflict.sources.len(),
                    });
                }
                ConflictStrategy::LastWins => last_wins(&conflict.sources),
                ConflictStrategy::Priority(list) => {
                    match list
                        .iter()
                        .find_map(|id| conflict.sources.iter().find(|s| &s.source_id == id))
                    {
                        Some(preferred) => preferred.clone(),
                        None => last_wins(&conflict.sources),
                    }
                }
            };
            winners.insert(conflict.dest.clone(), winner);
        }

        Ok(winners)
    }
}

fn last_wins(sources: &[SourceFileInfo]) -> SourceFileInfo {
    sources
        .iter()
        .max_by_key(|s| s.mapping_index)
        .cloned()
        .expect("conflict sources are non-empty")
}
