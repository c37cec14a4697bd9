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

use crate::global::is_valid_repo_id;

use super::{TransformCategory, TransformContext, TransformError, Transformer};

/// Rewrites references to the source repository into the target repository:
/// first the full `org/name` id, then the bare repository name.
pub struct RepoNameTransformer;

impl Transformer for RepoNameTransformer {
    fn name(&self) -> &'static str {
        "repo-name"
    }

    fn transform(
        &self,
        content: &str,
        tctx: &TransformContext,
    ) -> Result<String, TransformError> {
        for repo in [&tctx.source_repo, &tctx.target_repo] {
            if !is_valid_repo_id(repo) {
                return Err(TransformError::new(
                    TransformCategory::RepoNameFormat,
                    self.name(),
                    &tctx.file_path,
                    format!("'{repo}' is not a valid org/name repository id"),
                ));
            }
        }

        // Unwraps are safe after the id check above.
        let source_name = tctx.source_repo.split('/').nth(1).unwrap();
        let target_name = tctx.target_repo.split('/').nth(1).unwrap();

        let rewritten = content
            .replace(&tctx.source_repo, &tctx.target_repo)
            .replace(source_name, target_name);
        Ok(rewritten)
    }
}
