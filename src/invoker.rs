//! Tool invocation under a timeout
//!
//! Each call runs on tokio's blocking pool so a hung or panicking tool cannot
//! stall the agent loop. When the timeout fires the call's cancellation token is
//! cancelled; tools built with [`Tool::cancellable`](crate::Tool::cancellable)
//! stop early, others run to completion and their result is dropped.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::Tool;
use crate::types::ToolOutcome;

/// Invoke `tool` with `input`, giving up after `timeout_ms`
pub async fn invoke(tool: &Arc<Tool>, input: &str, timeout_ms: u64) -> ToolOutcome {
    invoke_with_cancel(tool, input, timeout_ms, &CancellationToken::new()).await
}

/// Like [`invoke`], but also stops waiting when `parent` is cancelled.
///
/// The tool sees a child of `parent`, so cancelling the run reaches the tool too.
pub async fn invoke_with_cancel(
    tool: &Arc<Tool>,
    input: &str,
    timeout_ms: u64,
    parent: &CancellationToken,
) -> ToolOutcome {
    let token = parent.child_token();
    let started = Instant::now();

    let task_tool = Arc::clone(tool);
    let task_input = input.to_string();
    let task_token = token.clone();
    let handle = tokio::task::spawn_blocking(move || {
        task_tool.execute_with(&task_input, &task_token)
    });

    let outcome = tokio::select! {
        joined = tokio::time::timeout(Duration::from_millis(timeout_ms), handle) => match joined {
            Ok(Ok(Ok(text))) => ToolOutcome::Success { text },
            Ok(Ok(Err(error))) => ToolOutcome::Failure {
                error,
                trace: capture_trace(),
            },
            Ok(Err(join_error)) => ToolOutcome::Failure {
                error: join_error_message(join_error),
                trace: capture_trace(),
            },
            Err(_) => {
                token.cancel();
                warn!(tool = tool.name(), timeout_ms, "Tool call timed out");
                ToolOutcome::Timeout {
                    elapsed_ms: timeout_ms,
                }
            }
        },
        _ = parent.cancelled() => {
            token.cancel();
            ToolOutcome::Failure {
                error: "tool call cancelled".to_string(),
                trace: String::new(),
            }
        }
    };

    debug!(
        tool = tool.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        success = outcome.is_success(),
        "Tool call finished"
    );
    outcome
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        format!("tool panicked: {}", panic_message(err.into_panic()))
    } else {
        "tool task was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Backtrace text when `RUST_BACKTRACE` enables capture, empty otherwise
pub(crate) fn capture_trace() -> String {
    let trace = Backtrace::capture();
    match trace.status() {
        BacktraceStatus::Captured => trace.to_string(),
        _ => String::new(),
    }
}
