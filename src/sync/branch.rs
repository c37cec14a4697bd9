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

use chrono::{DateTime, Utc};

use crate::{global::defaults::SHORT_COMMIT_SHA_LEN, utils::short_sha};

/// Sync branch grammar: `{prefix}-{groupID}-{YYYYMMDD}-{HHMMSS}-{shortSHA7}`.
pub fn generate_branch_name(
    prefix: &str,
    group_id: &str,
    now: DateTime<Utc>,
    source_commit: &str,
) -> String {
    let group = if group_id.is_empty() {
        "default"
    } else {
        group_id
    };
    format!(
        "{prefix}-{group}-{}-{}",
        now.format("%Y%m%d-%H%M%S"),
        short_sha(source_commit, SHORT_COMMIT_SHA_LEN)
    )
}

/// A branch belongs to the sync machinery when it starts with the prefix.
pub fn is_sync_branch(name: &str, prefix: &str) -> bool {
    name == prefix || name.starts_with(&format!("{prefix}-"))
}
