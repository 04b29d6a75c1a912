// ---------------------------------------------------------------------------
// tools/ai.rs - Code generation, voice and image tools backed by Luna Services
// ---------------------------------------------------------------------------

use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::upstream::UpstreamClient;

const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeGenArgs {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeGenOutput {
    pub code: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceArgs {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageArgs {
    pub image_url: String,
}

// ── language detection ──────────────────────────────────────────────────────

static LANGUAGE_HINTS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("rust", r"(?m)\bfn\s+\w+\s*\(|\blet\s+mut\b|\w+!\(|^\s*use\s+\w+::"),
        ("python", r"(?m)^\s*def\s+\w+\s*\(|^\s*import\s+\w+|^\s*from\s+\w+\s+import\b"),
        ("go", r"(?m)^\s*package\s+\w+|\bfunc\s+\w+\s*\("),
        ("typescript", r"(?m)\binterface\s+\w+\s*\{|:\s*(string|number|boolean)\b"),
        ("javascript", r"(?m)\bfunction\s+\w+\s*\(|\bconst\s+\w+\s*=|=>"),
    ]
    .into_iter()
    .filter_map(|(lang, pattern)| Regex::new(pattern).ok().map(|re| (lang, re)))
    .collect()
});

/// Best-effort language guess for a code snippet; `"text"` when nothing matches.
pub fn detect_language(code: &str) -> String {
    LANGUAGE_HINTS
        .iter()
        .find(|(_, re)| re.is_match(code))
        .map(|(lang, _)| lang.to_string())
        .unwrap_or_else(|| "text".to_string())
}

/// Deterministic snippet returned when the code backend cannot be reached.
pub fn fallback_snippet(prompt: &str) -> CodeGenOutput {
    let code = format!(
        "// Fallback (upstream unavailable)\n// Prompt: {}\nfn main() {{ println!(\"Hello, world!\"); }}",
        prompt.replace('\n', " ")
    );
    let language = detect_language(&code);
    CodeGenOutput { code, language }
}

// ── tools ───────────────────────────────────────────────────────────────────

/// Never fails on upstream errors: any of the three failure kinds yields the
/// fallback snippet.
pub async fn code_gen(upstream: &UpstreamClient, prompt: &str) -> Result<CodeGenOutput, ToolError> {
    match upstream.post_json("/api/ai/code", &json!({ "prompt": prompt })).await {
        Ok(data) => Ok(match data.get("code").and_then(Value::as_str) {
            Some(code) => CodeGenOutput {
                code: code.to_string(),
                language: data
                    .get("language")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| detect_language(code)),
            },
            None => {
                let code = data.to_string();
                let language = detect_language(&code);
                CodeGenOutput { code, language }
            }
        }),
        Err(e) => {
            tracing::warn!("code_gen: {} - serving fallback", e);
            Ok(fallback_snippet(prompt))
        }
    }
}

pub async fn voice_speak(upstream: &UpstreamClient, args: VoiceArgs) -> Result<Value, ToolError> {
    let mut payload = Map::new();
    payload.insert("text".into(), Value::String(args.text));
    if let Some(voice) = args.voice.filter(|v| !v.is_empty()) {
        payload.insert("voice".into(), Value::String(voice));
    }
    Ok(upstream.post_json("/api/ai/voice", &Value::Object(payload)).await?)
}

fn image_b64(data: &Value) -> String {
    data.get("image_b64").and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Grayscale conversion performed entirely by the upstream service.
pub async fn bw_remote(upstream: &UpstreamClient, image_url: &str) -> Result<String, ToolError> {
    let data = upstream
        .post_json("/api/image/bw", &json!({ "image_url": image_url }))
        .await?;
    Ok(image_b64(&data))
}

/// Fetch the image from this host, then hand the bytes to the upstream
/// converter. Useful for URLs only the gateway can reach.
pub async fn img_bw(
    client: &reqwest::Client,
    upstream: &UpstreamClient,
    image_url: &str,
) -> Result<String, ToolError> {
    let url = url::Url::parse(image_url)
        .map_err(|e| ToolError::failed(format!("invalid image_url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::failed("image_url must be http(s)"));
    }

    let resp = client
        .get(url)
        .timeout(IMAGE_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| ToolError::failed(format!("image fetch failed: {e}")))?
        .error_for_status()
        .map_err(|e| ToolError::failed(format!("image fetch failed: {e}")))?;
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ToolError::failed(format!("image read failed: {e}")))?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let data = upstream
        .post_json("/api/image/bw", &json!({ "image_b64": encoded }))
        .await?;
    Ok(image_b64(&data))
}
