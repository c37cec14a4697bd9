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

//! Textual rewriting of go.mod-style manifests. Only the single require
//! line of the named module is touched; indentation and trailing comments
//! are preserved.

use anyhow::{Result, bail};

fn ensure_v_prefix(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

/// Splits a require-style line into (indent, module, version, trailer).
/// Accepts both `require M V` and block-entry `\tM V // comment` shapes.
fn parse_require_line<'a>(line: &'a str, module: &str) -> Option<(String, &'a str, String)> {
    let indent_len = line.len() - line.trim_start().len();
    let indent = &line[..indent_len];
    let rest = &line[indent_len..];

    let rest_no_keyword = rest.strip_prefix("require ").unwrap_or(rest);
    let mut parts = rest_no_keyword.split_whitespace();
    let (Some(name), Some(_version)) = (parts.next(), parts.next()) else {
        return None;
    };
    if name != module {
        return None;
    }

    let trailer = match rest_no_keyword.find("//") {
        Some(pos) => format!(" {}", rest_no_keyword[pos..].trim_end()),
        None => String::new(),
    };
    let keyword = if rest.starts_with("require ") {
        "require "
    } else {
        ""
    };
    Some((format!("{indent}{keyword}"), name, trailer))
}

/// Replaces the require line of `module` with `version`. Returns the new
/// content and whether anything changed; applying the same update twice is
/// a no-op the second time.
pub fn update_dependency(content: &str, module: &str, version: &str) -> Result<(String, bool)> {
    if module.is_empty() {
        bail!("Module name must not be empty");
    }
    let version = ensure_v_prefix(version);

    let mut modified = false;
    let mut lines: Vec<String> = Vec::with_capacity(content.lines().count());

    for line in content.lines() {
        match parse_require_line(line, module) {
            Some((prefix, name, trailer)) => {
                let replacement = format!("{prefix}{name} {version}{trailer}");
                if replacement != line {
                    modified = true;
                }
                lines.push(replacement);
            }
            None => lines.push(line.to_string()),
        }
    }

    let mut result = lines.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    Ok((result, modified))
}

/// Returns the pinned version of `module`, if it is required.
pub fn pinned_version(content: &str, module: &str) -> Option<String> {
    for line in content.lines() {
        let trimmed = line.trim_start();
        let rest = trimmed.strip_prefix("require ").unwrap_or(trimmed);
        let mut parts = rest.split_whitespace();
        if let (Some(name), Some(version)) = (parts.next(), parts.next())
            && name == module
        {
            return Some(version.to_string());
        }
    }
    None
}

/// Adds a require entry for `module`. Prefers the first `require ( ... )`
/// block; otherwise inserts a single-line require after the `go` directive;
/// otherwise appends.
pub fn add_dependency(content: &str, module: &str, version: &str) -> Result<String> {
    if module.is_empty() {
        bail!("Module name must not be empty");
    }
    let version = ensure_v_prefix(version);
    let entry_line = format!("\t{module} {version}");
    let single_line = format!("require {module} {version}");

    let lines: Vec<&str> = content.lines().collect();

    // First choice: inside an existing require block.
    if let Some(open) = lines
        .iter()
        .position(|l| l.trim_start().starts_with("require ("))
    {
        let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        out.insert(open + 1, entry_line);
        return Ok(finish(content, out));
    }

    // Second choice: right after the go directive.
    if let Some(go_line) = lines.iter().position(|l| {
        let t = l.trim_start();
        t == "go" || t.starts_with("go ")
    }) {
        let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        out.insert(go_line + 1, String::new());
        out.insert(go_line + 2, single_line);
        return Ok(finish(content, out));
    }

    // Last resort: append.
    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    if !out.is_empty() {
        out.push(String::new());
    }
    out.push(single_line);
    Ok(finish(content, out))
}

fn finish(original: &str, lines: Vec<String>) -> String {
    let mut result = lines.join("\n");
    if original.ends_with('\n') || original.is_empty() {
        result.push('\n');
    }
    result
}
