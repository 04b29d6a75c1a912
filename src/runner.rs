// ---------------------------------------------------------------------------
// runner.rs - Subprocess execution with a hard timeout
// ---------------------------------------------------------------------------
//
// Every child is spawned with `kill_on_drop(true)`: when the timeout fires, or
// when the owning future is dropped (client disconnect), the process is killed
// rather than left running in the background.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::ToolError;
use crate::registry::FragmentStream;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// stdout followed by stderr.
    pub output: String,
}

fn describe(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_error(program: &str, err: std::io::Error) -> ToolError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ToolError::failed(format!("{program} is not installed or not on PATH"))
    } else {
        ToolError::failed(format!("Failed to spawn {program}: {err}"))
    }
}

/// Run `program` to completion, failing with [`ToolError::Timeout`] (and
/// killing the child) if it exceeds `timeout`.
pub async fn run_command(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<CommandOutput, ToolError> {
    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(out)) => {
            let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
            output.push_str(&String::from_utf8_lossy(&out.stderr));
            Ok(CommandOutput {
                exit_code: out.status.code().unwrap_or(-1),
                output,
            })
        }
        Ok(Err(e)) => Err(ToolError::failed(format!("Failed waiting for {program}: {e}"))),
        Err(_) => {
            // The child was owned by the dropped future; kill_on_drop reaps it.
            let command = describe(program, args);
            tracing::warn!(command = %command, "runner: timed out after {}s, killed", timeout.as_secs());
            Err(ToolError::Timeout { command, secs: timeout.as_secs() })
        }
    }
}

/// Newline-delimited chunks of `reader`, decoded lossily so a stray non-UTF-8
/// byte never stops the pipe from being drained.
fn lines<R>(reader: R) -> impl futures_util::Stream<Item = String> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures_util::stream::unfold(BufReader::new(reader), |mut reader| async move {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some((String::from_utf8_lossy(&buf).into_owned(), reader))
            }
        }
    })
}

/// Stream the combined stdout/stderr lines of `program` as they are produced,
/// finishing with an `[exit code: N]` line. The whole run, including the final
/// wait, shares one `timeout` budget.
pub fn stream_command(
    program: &'static str,
    args: Vec<String>,
    cwd: std::path::PathBuf,
    timeout: Duration,
) -> FragmentStream {
    Box::pin(async_stream::stream! {
        let spawned = Command::new(program)
            .args(&args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(c) => c,
            Err(e) => {
                yield Err(spawn_error(program, e));
                return;
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            yield Err(ToolError::failed(format!("{program}: output pipes unavailable")));
            return;
        };

        let deadline = tokio::time::Instant::now() + timeout;
        let mut merged = Box::pin(futures_util::stream::select(lines(stdout), lines(stderr)));
        let timed_out = ToolError::Timeout { command: describe(program, &args), secs: timeout.as_secs() };

        loop {
            match tokio::time::timeout_at(deadline, merged.next()).await {
                Ok(Some(line)) => yield Ok(format!("{line}\n")),
                Ok(None) => break,
                Err(_) => {
                    let _ = child.kill().await;
                    tracing::warn!(program = %program, "runner: stream timed out, killed");
                    yield Err(timed_out);
                    return;
                }
            }
        }

        match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => yield Ok(format!("[exit code: {}]\n", status.code().unwrap_or(-1))),
            Ok(Err(e)) => yield Err(ToolError::failed(format!("Failed waiting for {program}: {e}"))),
            Err(_) => {
                let _ = child.kill().await;
                yield Err(timed_out);
            }
        }
    })
}

/// Keep the last `max` characters of `text`.
pub fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max)).collect()
}
