// ---------------------------------------------------------------------------
// tools/automation.rs - CI dispatch, test runs, image builds and scaffolding
// ---------------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::registry::FragmentStream;
use crate::runner::{self, tail};
use crate::tools::github::GitHubClient;

const TEST_OUTPUT_TAIL: usize = 4000;
const TEST_SUMMARY_LINES: usize = 10;
const BUILD_OUTPUT_TAIL: usize = 1200;
pub const DEFAULT_IMAGE_TAG: &str = "luna-mcp:latest";

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("package name regex is valid"));

// ── ci_trigger ──────────────────────────────────────────────────────────────

fn default_ref() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowArgs {
    pub owner: String,
    pub repo: String,
    pub workflow_file: String,
    #[serde(rename = "ref", default = "default_ref")]
    pub git_ref: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowDispatched {
    pub dispatched: bool,
    pub workflow: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

pub async fn ci_trigger(gh: &GitHubClient, args: WorkflowArgs) -> Result<WorkflowDispatched, ToolError> {
    if !gh.has_token() {
        return Err(ToolError::failed("GITHUB_TOKEN required for workflow dispatch."));
    }
    let path = format!(
        "/repos/{}/{}/actions/workflows/{}/dispatches",
        args.owner, args.repo, args.workflow_file
    );
    let resp = gh
        .request(Method::POST, &path)
        .json(&json!({ "ref": args.git_ref, "inputs": args.inputs }))
        .send()
        .await
        .map_err(|e| ToolError::failed(format!("Workflow dispatch failed: {e}")))?;

    let status = resp.status();
    if status != StatusCode::NO_CONTENT && status != StatusCode::CREATED {
        let body = resp.text().await.unwrap_or_default();
        return Err(ToolError::failed(format!(
            "Workflow dispatch failed {}: {}",
            status.as_u16(),
            body.chars().take(400).collect::<String>()
        )));
    }

    tracing::info!(workflow = %args.workflow_file, git_ref = %args.git_ref, "ci_trigger: dispatched");
    Ok(WorkflowDispatched {
        dispatched: true,
        workflow: args.workflow_file,
        git_ref: args.git_ref,
    })
}

// ── run_tests ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TestRun {
    Skipped {
        skipped: bool,
        reason: String,
    },
    Completed {
        exit_code: i32,
        summary: Vec<String>,
        truncated_output: String,
    },
}

impl TestRun {
    fn skipped(reason: &str) -> Self {
        TestRun::Skipped { skipped: true, reason: reason.to_string() }
    }
}

fn has_tests_dir(workspace: &Path) -> bool {
    ["tests", "test"].iter().any(|d| workspace.join(d).is_dir())
}

/// Whether `program` resolves to a file on `PATH`.
pub fn on_path(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

fn precheck_tests(workspace: &Path) -> Option<TestRun> {
    if !has_tests_dir(workspace) {
        return Some(TestRun::skipped("No tests directory."));
    }
    if !on_path("pytest") {
        return Some(TestRun::skipped("pytest not installed (activate dev extras)."));
    }
    None
}

pub async fn run_tests(workspace: &Path, timeout: Duration) -> Result<TestRun, ToolError> {
    if let Some(skip) = precheck_tests(workspace) {
        return Ok(skip);
    }
    let out = runner::run_command("pytest", &["-q".to_string()], workspace, timeout).await?;
    let lines: Vec<&str> = out.output.lines().collect();
    let summary = lines[lines.len().saturating_sub(TEST_SUMMARY_LINES)..]
        .iter()
        .map(|l| l.to_string())
        .collect();
    Ok(TestRun::Completed {
        exit_code: out.exit_code,
        summary,
        truncated_output: tail(&out.output, TEST_OUTPUT_TAIL),
    })
}

/// Incremental pytest output; `None` when the run would be skipped.
pub fn stream_tests(workspace: &Path, timeout: Duration) -> Option<FragmentStream> {
    if precheck_tests(workspace).is_some() {
        return None;
    }
    Some(runner::stream_command("pytest", vec!["-q".to_string()], workspace.to_path_buf(), timeout))
}

// ── build_image ─────────────────────────────────────────────────────────────

fn default_tag() -> String {
    DEFAULT_IMAGE_TAG.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildArgs {
    #[serde(default = "default_tag")]
    pub tag: String,
}

#[derive(Debug, Serialize)]
pub struct ImageBuild {
    pub exit_code: i32,
    pub tag: String,
    pub tail: String,
}

fn build_args(tag: &str) -> Vec<String> {
    vec!["build".into(), "-t".into(), tag.to_string(), ".".into()]
}

pub async fn build_image(workspace: &Path, tag: String, timeout: Duration) -> Result<ImageBuild, ToolError> {
    let out = runner::run_command("docker", &build_args(&tag), workspace, timeout).await?;
    if out.exit_code != 0 {
        tracing::warn!(tag = %tag, "build_image: docker exited with {}", out.exit_code);
    }
    Ok(ImageBuild {
        exit_code: out.exit_code,
        tag,
        tail: tail(&out.output, BUILD_OUTPUT_TAIL),
    })
}

pub fn stream_build(workspace: &Path, tag: &str, timeout: Duration) -> FragmentStream {
    runner::stream_command("docker", build_args(tag), workspace.to_path_buf(), timeout)
}

// ── scaffold_project ────────────────────────────────────────────────────────

fn default_with_tests() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaffoldArgs {
    pub name: String,
    #[serde(default = "default_with_tests")]
    pub with_tests: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Scaffold {
    Created {
        created: bool,
        package: String,
        test_file: Option<String>,
    },
    Exists {
        created: bool,
        reason: String,
    },
}

async fn write_file(path: &Path, contents: String) -> Result<(), ToolError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ToolError::failed(format!("cannot write {}: {e}", path.display())))
}

/// Create `<workspace>/<name>/__init__.py` and, optionally, a smoke test in
/// `<workspace>/tests/`. Names must be valid Python identifiers.
pub async fn scaffold_project(workspace: &Path, args: ScaffoldArgs) -> Result<Scaffold, ToolError> {
    let name = args.name;
    if !PACKAGE_NAME.is_match(&name) {
        return Err(ToolError::Params(format!("invalid package name '{name}'")));
    }

    let package_dir = workspace.join(&name);
    if tokio::fs::try_exists(&package_dir).await.unwrap_or(false) {
        return Ok(Scaffold::Exists { created: false, reason: "already exists".into() });
    }

    tokio::fs::create_dir_all(&package_dir)
        .await
        .map_err(|e| ToolError::failed(format!("cannot create {}: {e}", package_dir.display())))?;
    write_file(
        &package_dir.join("__init__.py"),
        format!("\"\"\"Package {name} (auto-generated).\"\"\"\n"),
    )
    .await?;

    let mut test_file = None;
    if args.with_tests {
        let tests_dir: PathBuf = workspace.join("tests");
        tokio::fs::create_dir_all(&tests_dir)
            .await
            .map_err(|e| ToolError::failed(format!("cannot create {}: {e}", tests_dir.display())))?;
        let relative = format!("tests/test_{name}.py");
        write_file(
            &workspace.join(&relative),
            format!("def test_import_{name}():\n    import {name}  # noqa\n    assert True\n"),
        )
        .await?;
        test_file = Some(relative);
    }

    tracing::info!(package = %name, "scaffold_project: created");
    Ok(Scaffold::Created { created: true, package: name, test_file })
}
