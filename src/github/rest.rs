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

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use crate::context::Context;

use super::{
    Branch, Commit, GitTree, GithubClient, GithubError, PrState, PullRequest, PullRequestSpec,
    PullRequestUpdate, RepoFile, User,
};

const API_BASE: &str = "https://api.github.com";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Blocking REST client for the GitHub v3 API.
///
/// This layer does no retrying: the retry policy belongs to the tree cache,
/// which classifies errors through [`GithubError::is_retryable`].
pub struct RestGithub {
    http: Client,
    token: String,
    base_url: String,
}

// Wire DTOs. The public types flatten what the API nests.

#[derive(Deserialize)]
struct ApiContent {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Deserialize)]
struct ApiBranch {
    name: String,
    commit: ApiBranchCommit,
}

#[derive(Deserialize)]
struct ApiBranchCommit {
    sha: String,
}

#[derive(Deserialize)]
struct ApiPrRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    head: ApiPrRef,
    base: ApiPrRef,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    mergeable: Option<bool>,
}

impl From<ApiPullRequest> for PullRequest {
    fn from(pr: ApiPullRequest) -> Self {
        PullRequest {
            number: pr.number,
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            state: pr.state,
            head_ref: pr.head.name,
            base_ref: pr.base.name,
            html_url: pr.html_url,
            mergeable: pr.mergeable,
        }
    }
}

impl RestGithub {
    pub fn new(token: String) -> Result<Self, GithubError> {
        Self::with_base_url(token, API_BASE.to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Result<Self, GithubError> {
        let http = Client::builder()
            .user_agent(concat!("cotorra/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GithubError::Network(e.to_string()))?;
        Ok(Self {
            http,
            token,
            base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, ctx: &Context, req: RequestBuilder) -> Result<Response, GithubError> {
        ctx.check()?;
        let resp = req
            .bearer_auth(&self.token)
            .header("Accept", ACCEPT_JSON)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .map_err(|e| GithubError::Network(e.to_string()))?;
        ctx.check()?;
        Ok(resp)
    }

    /// Maps a non-success response onto the typed error space.
    fn error_for(resp: Response, resource: &str) -> GithubError {
        let status = resp.status().as_u16();
        let rate_limit_exhausted = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "0")
            .unwrap_or(false);
        let message = resp.text().unwrap_or_default();

        match status {
            404 => GithubError::NotFound {
                resource: resource.to_string(),
            },
            403 | 429 if rate_limit_exhausted || message.contains("rate limit") => {
                GithubError::RateLimited
            }
            422 => GithubError::ValidationFailed(message),
            500..=599 => GithubError::Server { status, message },
            _ => GithubError::Http { status, message },
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        resp: Response,
        resource: &str,
    ) -> Result<T, GithubError> {
        if !resp.status().is_success() {
            return Err(Self::error_for(resp, resource));
        }
        resp.json::<T>()
            .map_err(|e| GithubError::Decode(e.to_string()))
    }
}

impl GithubClient for RestGithub {
    fn get_file(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        rev: &str,
    ) -> Result<RepoFile, GithubError> {
        debug_assert!(!rev.is_empty(), "get_file requires an explicit ref");

        let resource = format!("{repo}:{path}@{rev}");
        let url = self.url(&format!("/repos/{repo}/contents/{path}"));
        let resp = self.send(ctx, self.http.get(&url).query(&[("ref", rev)]))?;
        let api: ApiContent = Self::read_json(resp, &resource)?;

        if api.encoding != "base64" {
            return Err(GithubError::Decode(format!(
                "unexpected content encoding '{}' for {resource}",
                api.encoding
            )));
        }
        let cleaned: String = api.content.split_whitespace().collect();
        let content = general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| GithubError::Decode(e.to_string()))?;

        Ok(RepoFile {
            path: path.to_string(),
            sha: api.sha,
            content,
        })
    }

    fn get_commit(&self, ctx: &Context, repo: &str, rev: &str) -> Result<Commit, GithubError> {
        let resource = format!("{repo}@{rev}");
        let url = self.url(&format!("/repos/{repo}/commits/{rev}"));
        let resp = self.send(ctx, self.http.get(&url))?;
        Self::read_json(resp, &resource)
    }

    fn get_git_tree(
        &self,
        ctx: &Context,
        repo: &str,
        sha: &str,
        recursive: bool,
    ) -> Result<GitTree, GithubError> {
        let resource = format!("{repo}/tree/{sha}");
        let url = self.url(&format!("/repos/{repo}/git/trees/{sha}"));
        let mut req = self.http.get(&url);
        if recursive {
            req = req.query(&[("recursive", "1")]);
        }
        let resp = self.send(ctx, req)?;
        Self::read_json(resp, &resource)
    }

    fn list_branches(&self, ctx: &Context, repo: &str) -> Result<Vec<Branch>, GithubError> {
        let resource = format!("{repo}/branches");
        let url = self.url(&format!("/repos/{repo}/branches"));
        let resp = self.send(ctx, self.http.get(&url).query(&[("per_page", "100")]))?;
        let branches: Vec<ApiBranch> = Self::read_json(resp, &resource)?;
        Ok(branches
            .into_iter()
            .map(|b| Branch {
                name: b.name,
                sha: b.commit.sha,
            })
            .collect())
    }

    fn get_branch(&self, ctx: &Context, repo: &str, name: &str) -> Result<Branch, GithubError> {
        let resource = format!("{repo}/branches/{name}");
        let url = self.url(&format!("/repos/{repo}/branches/{name}"));
        let resp = self.send(ctx, self.http.get(&url))?;
        let branch: ApiBranch = Self::read_json(resp, &resource)?;
        Ok(Branch {
            name: branch.name,
            sha: branch.commit.sha,
        })
    }

    fn delete_branch(&self, ctx: &Context, repo: &str, name: &str) -> Result<(), GithubError> {
        let resource = format!("{repo}/heads/{name}");
        let url = self.url(&format!("/repos/{repo}/git/refs/heads/{name}"));
        let resp = self.send(ctx, self.http.delete(&url))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for(resp, &resource))
        }
    }

    fn list_pull_requests(
        &self,
        ctx: &Context,
        repo: &str,
        state: PrState,
    ) -> Result<Vec<PullRequest>, GithubError> {
        let resource = format!("{repo}/pulls");
        let url = self.url(&format!("/repos/{repo}/pulls"));
        let resp = self.send(
            ctx,
            self.http
                .get(&url)
                .query(&[("state", state.as_str()), ("per_page", "100")]),
        )?;
        let prs: Vec<ApiPullRequest> = Self::read_json(resp, &resource)?;
        Ok(prs.into_iter().map(PullRequest::from).collect())
    }

    fn get_pull_request(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, GithubError> {
        let resource = format!("{repo}/pulls/{number}");
        let url = self.url(&format!("/repos/{repo}/pulls/{number}"));
        let resp = self.send(ctx, self.http.get(&url))?;
        let pr: ApiPullRequest = Self::read_json(resp, &resource)?;
        Ok(PullRequest::from(pr))
    }

    fn create_pull_request(
        &self,
        ctx: &Context,
        repo: &str,
        spec: &PullRequestSpec,
    ) -> Result<PullRequest, GithubError> {
        let resource = format!("{repo}/pulls");
        let url = self.url(&format!("/repos/{repo}/pulls"));
        let body = json!({
            "title": spec.title,
            "body": spec.body,
            "head": spec.head,
            "base": spec.base,
        });
        let resp = self.send(ctx, self.http.post(&url).json(&body))?;
        let pr: ApiPullRequest = Self::read_json(resp, &resource)?;
        let pr = PullRequest::from(pr);

        // Assignees, labels and reviewers ride on separate endpoints. They
        // are best-effort: the PR exists either way.
        if !spec.assignees.is_empty() || !spec.labels.is_empty() {
            let issue_url = self.url(&format!("/repos/{repo}/issues/{}", pr.number));
            let patch = json!({
                "assignees": spec.assignees,
                "labels": spec.labels,
            });
            let _ = self.send(ctx, self.http.patch(&issue_url).json(&patch));
        }
        if !spec.reviewers.is_empty() || !spec.team_reviewers.is_empty() {
            let reviewers_url = self.url(&format!(
                "/repos/{repo}/pulls/{}/requested_reviewers",
                pr.number
            ));
            let body = json!({
                "reviewers": spec.reviewers,
                "team_reviewers": spec.team_reviewers,
            });
            let _ = self.send(ctx, self.http.post(&reviewers_url).json(&body));
        }

        Ok(pr)
    }

    fn update_pull_request(
        &self,
        ctx: &Context,
        repo: &str,
        number: u64,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, GithubError> {
        let resource = format!("{repo}/pulls/{number}");
        let url = self.url(&format!("/repos/{repo}/pulls/{number}"));

        let mut body = serde_json::Map::new();
        if let Some(title) = &update.title {
            body.insert("title".to_string(), json!(title));
        }
        if let Some(text) = &update.body {
            body.insert("body".to_string(), json!(text));
        }

        let resp = self.send(
            ctx,
            self.http.patch(&url).json(&serde_json::Value::Object(body)),
        )?;
        let pr: ApiPullRequest = Self::read_json(resp, &resource)?;
        Ok(PullRequest::from(pr))
    }

    fn current_user(&self, ctx: &Context) -> Result<User, GithubError> {
        let url = self.url("/user");
        let resp = self.send(ctx, self.http.get(&url))?;
        Self::read_json(resp, "user")
    }
}
