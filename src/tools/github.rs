// ---------------------------------------------------------------------------
// tools/github.rs - GitHub REST tools and repository cloning
// ---------------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::runner::{self, tail};

const USER_AGENT: &str = "luna-mcp";
const GITHUB_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 400;

/// Thin wrapper over the GitHub REST API. Requests are anonymous unless a
/// token is configured.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(client: reqwest::Client, api_base: &str, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.api_base, path))
            .timeout(GITHUB_TIMEOUT)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    /// Send and decode a JSON body, turning any non-2xx answer into a failure
    /// that carries the status and a truncated body.
    async fn send_json(&self, what: &str, req: RequestBuilder) -> Result<Value, ToolError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ToolError::failed(format!("{what} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::failed(format!(
                "{what} failed {}: {}",
                status.as_u16(),
                tail_chars(&body)
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ToolError::failed(format!("{what}: invalid JSON from GitHub: {e}")))
    }
}

fn tail_chars(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

// ── arguments / results ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloneArgs {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchArgs {
    pub owner: String,
    pub repo: String,
    pub base: String,
    pub new_branch: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitArgs {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
    pub content_b64: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullRequestArgs {
    pub owner: String,
    pub repo: String,
    pub head: String,
    pub base: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

fn default_issue_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuesArgs {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_issue_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ClonedRepo {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct BranchCreated {
    pub branch: String,
}

#[derive(Debug, Serialize)]
pub struct FileCommitted {
    pub status: &'static str,
    pub path: String,
    pub branch: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueList {
    pub issues: Vec<Issue>,
}

// ── git clone ───────────────────────────────────────────────────────────────

/// Directory name for a clone URL: last path segment without `.git`.
pub fn repo_dir_name(url: &str) -> Result<String, ToolError> {
    let parsed = url::Url::parse(url).map_err(|e| ToolError::failed(format!("invalid repository url: {e}")))?;
    let name = parsed
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .map(|s| s.trim_end_matches(".git").to_string())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ToolError::failed(format!("cannot derive a directory name from '{url}'")));
    }
    Ok(name)
}

/// Shallow, blobless clone into `<workspace>/repos/<name>`. An existing
/// destination is returned as-is.
pub async fn git_clone(workspace: &Path, url: &str, timeout: Duration) -> Result<ClonedRepo, ToolError> {
    let name = repo_dir_name(url)?;
    let repos_dir = workspace.join("repos");
    let dest: PathBuf = repos_dir.join(&name);

    if tokio::fs::metadata(&dest).await.is_ok_and(|m| m.is_dir()) {
        tracing::debug!(path = %dest.display(), "git_clone: already present");
        return Ok(ClonedRepo { path: dest.display().to_string() });
    }

    tokio::fs::create_dir_all(&repos_dir)
        .await
        .map_err(|e| ToolError::failed(format!("cannot create {}: {e}", repos_dir.display())))?;

    let args = vec![
        "clone".to_string(),
        "--depth".to_string(),
        "1".to_string(),
        "--filter=blob:none".to_string(),
        url.to_string(),
        dest.display().to_string(),
    ];
    let out = runner::run_command("git", &args, workspace, timeout).await?;
    if out.exit_code != 0 {
        return Err(ToolError::failed(format!(
            "git clone failed ({}): {}",
            out.exit_code,
            tail(&out.output, 2000)
        )));
    }

    tracing::info!(path = %dest.display(), "git_clone: cloned {}", url);
    Ok(ClonedRepo { path: dest.display().to_string() })
}

// ── REST tools ──────────────────────────────────────────────────────────────

pub async fn create_branch(gh: &GitHubClient, args: BranchArgs) -> Result<BranchCreated, ToolError> {
    let repo = format!("/repos/{}/{}", args.owner, args.repo);
    let base_ref = gh
        .send_json(
            "create_branch",
            gh.request(Method::GET, &format!("{repo}/git/ref/heads/{}", args.base)),
        )
        .await?;
    let sha = base_ref
        .pointer("/object/sha")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::failed(format!("create_branch: base ref '{}' has no sha", args.base)))?
        .to_string();

    gh.send_json(
        "create_branch",
        gh.request(Method::POST, &format!("{repo}/git/refs"))
            .json(&json!({ "ref": format!("refs/heads/{}", args.new_branch), "sha": sha })),
    )
    .await?;

    Ok(BranchCreated { branch: args.new_branch })
}

/// Decode `content_b64`, insisting on UTF-8 text.
pub fn decode_text_content(content_b64: &str) -> Result<String, ToolError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(content_b64.trim())
        .map_err(|_| ToolError::failed("Invalid base64 content"))?;
    String::from_utf8(bytes).map_err(|_| ToolError::failed("Invalid base64 content"))
}

pub async fn commit_file(gh: &GitHubClient, args: CommitArgs) -> Result<FileCommitted, ToolError> {
    let text = decode_text_content(&args.content_b64)?;
    let contents = format!("/repos/{}/{}/contents/{}", args.owner, args.repo, args.path);

    let existing = gh
        .request(Method::GET, &contents)
        .query(&[("ref", args.branch.as_str())])
        .send()
        .await
        .map_err(|e| ToolError::failed(format!("commit_file failed: {e}")))?;
    let sha = match existing.status() {
        StatusCode::NOT_FOUND => None,
        s if s.is_success() => existing
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("sha").and_then(Value::as_str).map(str::to_string)),
        s => {
            let body = existing.text().await.unwrap_or_default();
            return Err(ToolError::failed(format!("commit_file failed {}: {}", s.as_u16(), tail_chars(&body))));
        }
    };

    let mut payload = json!({
        "message": args.message,
        "content": base64::engine::general_purpose::STANDARD.encode(text.as_bytes()),
        "branch": args.branch,
    });
    let status = match sha {
        Some(sha) => {
            payload["sha"] = Value::String(sha);
            "updated"
        }
        None => "created",
    };

    gh.send_json("commit_file", gh.request(Method::PUT, &contents).json(&payload))
        .await?;

    Ok(FileCommitted { status, path: args.path, branch: args.branch })
}

pub async fn open_pr(gh: &GitHubClient, args: PullRequestArgs) -> Result<PullRequest, ToolError> {
    let pr = gh
        .send_json(
            "open_pr",
            gh.request(Method::POST, &format!("/repos/{}/{}/pulls", args.owner, args.repo))
                .json(&json!({
                    "title": args.title,
                    "body": args.body,
                    "head": args.head,
                    "base": args.base,
                })),
        )
        .await?;

    Ok(PullRequest {
        number: pr.get("number").and_then(Value::as_u64).unwrap_or_default(),
        url: pr.get("html_url").and_then(Value::as_str).unwrap_or_default().to_string(),
        title: pr.get("title").and_then(Value::as_str).unwrap_or(&args.title).to_string(),
    })
}

fn parse_issue(raw: &Value) -> Issue {
    Issue {
        number: raw.get("number").and_then(Value::as_u64).unwrap_or_default(),
        title: raw.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
        url: raw.get("html_url").and_then(Value::as_str).unwrap_or_default().to_string(),
        labels: raw
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l.get("name").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Open issues, at most `limit` of them (GitHub caps a page at 100).
pub async fn list_issues(gh: &GitHubClient, args: IssuesArgs) -> Result<IssueList, ToolError> {
    if args.limit == 0 {
        return Ok(IssueList { issues: Vec::new() });
    }
    let per_page = args.limit.min(100).to_string();
    let raw = gh
        .send_json(
            "list_issues",
            gh.request(Method::GET, &format!("/repos/{}/{}/issues", args.owner, args.repo))
                .query(&[("state", "open"), ("per_page", per_page.as_str())]),
        )
        .await?;

    let issues = raw
        .as_array()
        .map(|items| items.iter().take(args.limit).map(parse_issue).collect())
        .unwrap_or_default();
    Ok(IssueList { issues })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_dir_name_strips_git_suffix() {
        assert_eq!(repo_dir_name("https://github.com/octo/hello.git").unwrap(), "hello");
        assert_eq!(repo_dir_name("https://github.com/octo/hello/").unwrap(), "hello");
        assert!(repo_dir_name("not a url").is_err());
        assert!(repo_dir_name("https://github.com/").is_err());
    }

    #[tokio::test]
    async fn git_clone_is_idempotent_for_existing_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("repos").join("hello");
        std::fs::create_dir_all(&existing).unwrap();

        let out = git_clone(dir.path(), "https://github.com/octo/hello.git", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.path, existing.display().to_string());
    }

    #[test]
    fn content_must_be_base64_utf8() {
        assert_eq!(decode_text_content("aGVsbG8=").unwrap(), "hello");
        assert!(decode_text_content("***").is_err());
        // 0xFF 0xFE is valid base64 but not UTF-8.
        assert!(decode_text_content("//4=").is_err());
    }

    #[tokio::test]
    async fn commit_file_rejects_bad_content_before_calling_github() {
        let gh = GitHubClient::new(reqwest::Client::new(), "http://127.0.0.1:1", None);
        let err = commit_file(
            &gh,
            CommitArgs {
                owner: "o".into(),
                repo: "r".into(),
                branch: "main".into(),
                path: "README.md".into(),
                content_b64: "%%%".into(),
                message: "m".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid base64 content");
    }

    #[tokio::test]
    async fn commit_file_lookup_failure_is_a_tool_failure() {
        let gh = GitHubClient::new(reqwest::Client::new(), "http://127.0.0.1:1", None);
        let err = commit_file(
            &gh,
            CommitArgs {
                owner: "o".into(),
                repo: "r".into(),
                branch: "feature/x".into(),
                path: "README.md".into(),
                content_b64: "aGVsbG8=".into(),
                message: "m".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Failed(m) if m.starts_with("commit_file failed")));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_tool_failure() {
        let gh = GitHubClient::new(reqwest::Client::new(), "http://127.0.0.1:1/", Some(String::new()));
        assert!(!gh.has_token());
        let err = list_issues(&gh, IssuesArgs { owner: "o".into(), repo: "r".into(), limit: 5 })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(m) if m.starts_with("list_issues failed")));
    }

    #[test]
    fn issues_keep_label_names() {
        let issue = parse_issue(&json!({
            "number": 3,
            "title": "Crash",
            "html_url": "https://github.com/o/r/issues/3",
            "labels": [{"name": "bug"}, {"name": "p1"}],
        }));
        assert_eq!(
            issue,
            Issue {
                number: 3,
                title: "Crash".into(),
                url: "https://github.com/o/r/issues/3".into(),
                labels: vec!["bug".into(), "p1".into()],
            }
        );
    }

    #[tokio::test]
    async fn zero_limit_skips_the_request() {
        let gh = GitHubClient::new(reqwest::Client::new(), "http://127.0.0.1:1", None);
        let out = list_issues(&gh, IssuesArgs { owner: "o".into(), repo: "r".into(), limit: 0 })
            .await
            .unwrap();
        assert!(out.issues.is_empty());
    }
}
