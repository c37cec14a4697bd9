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

//! Pull request rendering: title, body and the machine-parseable metadata
//! block every sync PR carries.

use chrono::{DateTime, Utc};

use crate::{
    config::{GroupConfig, PrLists, TargetConfig},
    global::defaults::SHORT_COMMIT_SHA_LEN,
    sync::metrics::DirectoryMetrics,
    utils::{format_count, short_sha},
};

pub const METADATA_BEGIN: &str = "<!-- cotorra-metadata";
pub const METADATA_END: &str = "-->";

/// What a sync run changed, fed to body and commit-message rendering.
#[derive(Debug, Clone, Default)]
pub struct ChangeSummary {
    pub group_id: String,
    pub group_name: String,
    pub source_repo: String,
    pub source_commit: String,
    pub target_repo: String,
    pub changed_paths: Vec<String>,
    pub files_deleted: u64,
    /// Contact addresses configured on the source, surfaced in the body.
    pub security_email: Option<String>,
    pub support_email: Option<String>,
}

/// Optional AI collaborators for commit messages and PR bodies. `None`
/// means the generator fell back and the static template should be used.
/// The metadata block is never AI-authored.
pub trait DescriptionGenerator: Send + Sync {
    fn commit_message(&self, summary: &ChangeSummary) -> Option<String>;
    fn pr_body(&self, summary: &ChangeSummary) -> Option<String>;
}

pub fn pr_title(source_commit: &str) -> String {
    format!(
        "[Sync] Update project files from source repository ({})",
        short_sha(source_commit, SHORT_COMMIT_SHA_LEN)
    )
}

/// Static commit message naming the file, or the count when several changed.
pub fn static_commit_message(summary: &ChangeSummary) -> String {
    match summary.changed_paths.as_slice() {
        [] => format!("Sync files from {}", summary.source_repo),
        [single] => format!("Sync {} from {}", single, summary.source_repo),
        many => format!(
            "Sync {} from {}",
            format_count(many.len(), "file", "files"),
            summary.source_repo
        ),
    }
}

/// Static PR body used when no AI body is available.
pub fn static_body(summary: &ChangeSummary) -> String {
    let mut files = String::new();
    for path in &summary.changed_paths {
        files.push_str(&format!("- `{path}`\n"));
    }
    if files.is_empty() {
        files.push_str("- (file list unavailable)\n");
    }

    let mut contacts = String::new();
    if let Some(email) = &summary.support_email {
        contacts.push_str(&format!("\nQuestions about this sync: {email}\n"));
    }
    if let Some(email) = &summary.security_email {
        contacts.push_str(&format!("Security concerns: {email}\n"));
    }

    format!(
        "## What Changed\n\n\
         Synchronized {count} from `{source}` at `{commit}`:\n\n{files}\n\
         ## Why\n\n\
         This repository receives shared files broadcast from `{source}`. \
         This update keeps it aligned with the latest source commit.\n\n\
         ## Testing\n\n\
         Content was diffed against the `{target}` tree before this PR was \
         opened; only files that differ are included.\n\n\
         ## Impact\n\n\
         Review the file list above. Closing this PR leaves the repository \
         on its previous copy of the shared files.\n{contacts}",
        count = format_count(summary.changed_paths.len(), "file", "files"),
        source = summary.source_repo,
        commit = short_sha(&summary.source_commit, SHORT_COMMIT_SHA_LEN),
        target = summary.target_repo,
    )
}

/// Everything persisted in the metadata block.
#[derive(Debug, Clone, Default)]
pub struct PrMetadata {
    pub group_id: String,
    pub group_name: String,
    pub source_repo: String,
    pub source_commit: String,
    pub target_repo: String,
    pub sync_commit: String,
    pub sync_time: DateTime<Utc>,
    pub staged_repo_available: bool,
    pub changed_files_count: usize,
    pub files_with_original_content: usize,
    pub files_without_original_content: usize,
    pub ai_commit_message: bool,
    pub ai_pr_body: bool,
    pub directories: Vec<DirectoryMetrics>,
    pub total_files: u64,
    pub files_deleted: u64,
    pub api_calls_saved: u64,
    pub cache_hits: u64,
}

/// Renders the machine-parseable YAML block inside an HTML comment.
pub fn render_metadata(meta: &PrMetadata) -> String {
    let mut out = String::new();
    out.push_str(METADATA_BEGIN);
    out.push('\n');
    out.push_str(&format!(
        "group: {{id: {}, name: {}}}\n",
        meta.group_id, meta.group_name
    ));
    out.push_str(&format!(
        "diff_info: {{staged_repo_available: {}, changed_files_count: {}, \
         files_with_original_content: {}, files_without_original_content: {}}}\n",
        meta.staged_repo_available,
        meta.changed_files_count,
        meta.files_with_original_content,
        meta.files_without_original_content
    ));
    out.push_str("sync_metadata:\n");
    out.push_str(&format!("  source_repo: {}\n", meta.source_repo));
    out.push_str(&format!("  source_commit: {}\n", meta.source_commit));
    out.push_str(&format!("  target_repo: {}\n", meta.target_repo));
    out.push_str(&format!("  sync_commit: {}\n", meta.sync_commit));
    out.push_str(&format!("  sync_time: {}\n", meta.sync_time.to_rfc3339()));
    out.push_str(&format!(
        "ai_generated: {{commit_message: {}, pr_body: {}}}\n",
        meta.ai_commit_message, meta.ai_pr_body
    ));
    out.push_str("directories:\n");
    for dir in &meta.directories {
        out.push_str(&format!(
            "  - {{src: {}, dest: {}, excluded: [{}], files_synced: {}, \
             files_examined: {}, files_excluded: {}, processing_time_ms: {}}}\n",
            dir.src,
            dir.dest,
            dir.excluded.join(", "),
            dir.files_synced,
            dir.files_examined,
            dir.files_excluded,
            dir.processing_ms
        ));
    }
    out.push_str(&format!(
        "performance: {{total_files: {}, files_deleted: {}, api_calls_saved: {}, cache_hits: {}}}\n",
        meta.total_files, meta.files_deleted, meta.api_calls_saved, meta.cache_hits
    ));
    out.push_str(METADATA_END);
    out
}

/// The subset of metadata state discovery needs back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetadata {
    pub source_repo: String,
    pub source_commit: String,
    pub target_repo: String,
    pub sync_commit: String,
}

/// Parses the metadata block out of a PR body, if present.
pub fn parse_metadata(body: &str) -> Option<ParsedMetadata> {
    let begin = body.find(METADATA_BEGIN)?;
    let block = &body[begin + METADATA_BEGIN.len()..];
    let end = block.find(METADATA_END)?;
    let block = &block[..end];

    let mut parsed = ParsedMetadata::default();
    for line in block.lines() {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("source_repo: ") {
            parsed.source_repo = value.trim().to_string();
        } else if let Some(value) = trimmed.strip_prefix("source_commit: ") {
            parsed.source_commit = value.trim().to_string();
        } else if let Some(value) = trimmed.strip_prefix("target_repo: ") {
            parsed.target_repo = value.trim().to_string();
        } else if let Some(value) = trimmed.strip_prefix("sync_commit: ") {
            parsed.sync_commit = value.trim().to_string();
        }
    }

    if parsed.source_commit.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

/// Assembles the full body: AI content (when real) or the static template,
/// always followed by the metadata block.
pub fn render_body(ai_body: Option<String>, summary: &ChangeSummary, meta: &PrMetadata) -> String {
    let narrative = match ai_body {
        Some(text) => text,
        None => static_body(summary),
    };
    format!("{narrative}\n\n{}", render_metadata(meta))
}

/// Union preserving first-occurrence order.
pub fn merge_unique(primary: &[String], secondary: &[String]) -> Vec<String> {
    let mut merged = Vec::new();
    for item in primary.iter().chain(secondary.iter()) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

/// Final PR lists: merge_unique(group global, target override), falling
/// back to the group defaults when a merged list is empty. The current
/// authenticated user cannot review their own PR and is dropped from the
/// reviewer list. Automerge labels join the label set when enabled.
pub fn assemble_pr_lists(
    group: &GroupConfig,
    target: &TargetConfig,
    current_user: Option<&str>,
    automerge: bool,
    automerge_labels: &[String],
) -> PrLists {
    let pick = |global: &[String], over: &[String], fallback: &[String]| {
        let merged = merge_unique(global, over);
        if merged.is_empty() {
            fallback.to_vec()
        } else {
            merged
        }
    };

    let mut reviewers = pick(
        &group.pr_global.reviewers,
        &target.pr.reviewers,
        &group.pr_defaults.reviewers,
    );
    if let Some(user) = current_user {
        reviewers.retain(|r| r != user);
    }

    let mut labels = pick(
        &group.pr_global.labels,
        &target.pr.labels,
        &group.pr_defaults.labels,
    );
    if automerge {
        labels = merge_unique(&labels, automerge_labels);
    }

    PrLists {
        assignees: pick(
            &group.pr_global.assignees,
            &target.pr.assignees,
            &group.pr_defaults.assignees,
        ),
        reviewers,
        team_reviewers: pick(
            &group.pr_global.team_reviewers,
            &target.pr.team_reviewers,
            &group.pr_defaults.team_reviewers,
        ),
        labels,
    }
}
