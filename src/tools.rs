//! Tool catalogue exposed through the gateway.
//!
//! - `code_gen`, `voice_speak`, `bw_remote`, `img_bw`: Luna Services backed ([`ai`])
//! - `git_clone`, `create_branch`, `commit_file`, `open_pr`, `list_issues`: repositories ([`github`])
//! - `ci_trigger`, `run_tests`, `build_image`, `scaffold_project`: automation ([`automation`])
//!
//! `run_tests` and `build_image` also stream their process output line by
//! line when invoked over `/public/stream`.

pub mod ai;
pub mod automation;
pub mod github;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::registry::{RegistryError, Tool, ToolRegistry};
use crate::upstream::UpstreamClient;

use self::ai::{CodeGenArgs, ImageArgs, VoiceArgs};
use self::automation::{BuildArgs, ScaffoldArgs, WorkflowArgs};
use self::github::{BranchArgs, CloneArgs, CommitArgs, GitHubClient, IssuesArgs, PullRequestArgs};

/// Shared dependencies captured by every tool closure.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub upstream: UpstreamClient,
    pub github: GitHubClient,
    pub http: reqwest::Client,
    pub workspace_dir: PathBuf,
    pub command_timeout: Duration,
}

impl ToolContext {
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        Self {
            upstream: UpstreamClient::new(http.clone(), &config.luna_url),
            github: GitHubClient::new(http.clone(), &config.github_api_url, config.github_token.clone()),
            http,
            workspace_dir: config.workspace_dir.clone(),
            command_timeout: config.command_timeout,
        }
    }
}

/// Argument struct for tools that take no parameters.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

/// Register the full catalogue. Fails only on a duplicate name.
pub fn build_registry(ctx: Arc<ToolContext>) -> Result<ToolRegistry, RegistryError> {
    let mut reg = ToolRegistry::new();

    // ── Luna Services ───────────────────────────────────────────────────────
    let c = ctx.clone();
    reg.register(Tool::simple(
        "code_gen",
        "Generate code through Luna Services with graceful fallback",
        move |a: CodeGenArgs| {
            let c = c.clone();
            async move { ai::code_gen(&c.upstream, &a.prompt).await }
        },
    ))?;

    let c = ctx.clone();
    reg.register(Tool::simple(
        "voice_speak",
        "Text-to-speech via Luna Services; returns base64 audio payload",
        move |a: VoiceArgs| {
            let c = c.clone();
            async move { ai::voice_speak(&c.upstream, a).await }
        },
    ))?;

    let c = ctx.clone();
    reg.register(Tool::simple(
        "bw_remote",
        "Remote grayscale transform through Luna Services",
        move |a: ImageArgs| {
            let c = c.clone();
            async move { ai::bw_remote(&c.upstream, &a.image_url).await }
        },
    ))?;

    let c = ctx.clone();
    reg.register(Tool::simple(
        "img_bw",
        "Fetch image & convert to grayscale (base64 PNG)",
        move |a: ImageArgs| {
            let c = c.clone();
            async move { ai::img_bw(&c.http, &c.upstream, &a.image_url).await }
        },
    ))?;

    // ── repositories ────────────────────────────────────────────────────────
    let c = ctx.clone();
    reg.register(Tool::simple(
        "git_clone",
        "Shallow clone a public GitHub repository",
        move |a: CloneArgs| {
            let c = c.clone();
            async move { github::git_clone(&c.workspace_dir, &a.url, c.command_timeout).await }
        },
    ))?;

    let c = ctx.clone();
    reg.register(Tool::simple(
        "create_branch",
        "Create branch from base ref in a repository",
        move |a: BranchArgs| {
            let c = c.clone();
            async move { github::create_branch(&c.github, a).await }
        },
    ))?;

    let c = ctx.clone();
    reg.register(Tool::simple(
        "commit_file",
        "Create or update (base64) file content on a branch",
        move |a: CommitArgs| {
            let c = c.clone();
            async move { github::commit_file(&c.github, a).await }
        },
    ))?;

    let c = ctx.clone();
    reg.register(Tool::simple(
        "open_pr",
        "Open a pull request from head to base",
        move |a: PullRequestArgs| {
            let c = c.clone();
            async move { github::open_pr(&c.github, a).await }
        },
    ))?;

    let c = ctx.clone();
    reg.register(Tool::simple(
        "list_issues",
        "List open issues (limited)",
        move |a: IssuesArgs| {
            let c = c.clone();
            async move { github::list_issues(&c.github, a).await }
        },
    ))?;

    // ── automation ──────────────────────────────────────────────────────────
    let c = ctx.clone();
    reg.register(Tool::simple(
        "ci_trigger",
        "Trigger a GitHub Actions workflow via workflow file name",
        move |a: WorkflowArgs| {
            let c = c.clone();
            async move { automation::ci_trigger(&c.github, a).await }
        },
    ))?;

    let (c, s) = (ctx.clone(), ctx.clone());
    reg.register(Tool::streaming(
        "run_tests",
        "Run pytest (if installed) and return summary",
        move |_: NoArgs| {
            let c = c.clone();
            async move { automation::run_tests(&c.workspace_dir, c.command_timeout).await }
        },
        move |_: NoArgs| automation::stream_tests(&s.workspace_dir, s.command_timeout),
    ))?;

    let (c, s) = (ctx.clone(), ctx.clone());
    reg.register(Tool::streaming(
        "build_image",
        "Build a Docker image from current directory",
        move |a: BuildArgs| {
            let c = c.clone();
            async move { automation::build_image(&c.workspace_dir, a.tag, c.command_timeout).await }
        },
        move |a: BuildArgs| Some(automation::stream_build(&s.workspace_dir, &a.tag, s.command_timeout)),
    ))?;

    let c = ctx;
    reg.register(Tool::simple(
        "scaffold_project",
        "Scaffold a new Python package (with optional tests)",
        move |a: ScaffoldArgs| {
            let c = c.clone();
            async move { automation::scaffold_project(&c.workspace_dir, a).await }
        },
    ))?;

    tracing::info!("tools: registered {} tools", reg.len());
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolBody;

    fn context(workspace: PathBuf) -> Arc<ToolContext> {
        let config = Config::from_lookup(|key| match key {
            "LUNA_URL" => Some("http://127.0.0.1:1".to_string()),
            "WORKSPACE_DIR" => Some(workspace.display().to_string()),
            _ => None,
        });
        Arc::new(ToolContext::from_config(&config, reqwest::Client::new()))
    }

    #[test]
    fn catalogue_is_complete() {
        let reg = build_registry(context(PathBuf::from("."))).unwrap();
        assert_eq!(
            reg.list_names(),
            vec![
                "build_image",
                "bw_remote",
                "ci_trigger",
                "code_gen",
                "commit_file",
                "create_branch",
                "git_clone",
                "img_bw",
                "list_issues",
                "open_pr",
                "run_tests",
                "scaffold_project",
                "voice_speak",
            ]
        );
        for streaming in ["run_tests", "build_image"] {
            let tool = reg.resolve(streaming).unwrap();
            assert!(matches!(tool.body(), ToolBody::Streaming(..)), "{streaming}");
        }
        assert!(matches!(reg.resolve("code_gen").unwrap().body(), ToolBody::Simple(_)));
    }

    #[tokio::test]
    async fn code_gen_tool_serves_fallback_offline() {
        let reg = build_registry(context(PathBuf::from("."))).unwrap();
        let tool = reg.resolve("code_gen").unwrap();
        let mut params = crate::params::Params::new();
        params.insert("prompt".into(), "Test fallback".into());
        let out = tool.call(params).await.unwrap();
        assert!(out["code"].as_str().unwrap().contains("Fallback"));
        assert_eq!(out["language"], "rust");
    }

    #[tokio::test]
    async fn run_tests_rejects_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let reg = build_registry(context(dir.path().to_path_buf())).unwrap();
        let tool = reg.resolve("run_tests").unwrap();

        let mut params = crate::params::Params::new();
        params.insert("verbose".into(), true.into());
        let err = tool.call(params).await.unwrap_err();
        assert!(err.to_string().contains("verbose"));

        let out = tool.call(crate::params::Params::new()).await.unwrap();
        assert_eq!(out["skipped"], true);
    }
}
