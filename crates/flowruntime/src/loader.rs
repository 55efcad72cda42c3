//! Out-of-process executor extensions.
//!
//! A node type whose executor reference is `plugin:<path>` runs `<path>` as a
//! child process. Loading performs a handshake (`<path> describe`) that must
//! report the factory entry point [`FACTORY_ENTRY_POINT`] and protocol
//! [`PROTOCOL_VERSION`]. Each invocation runs `<path> execute` with a
//! `{"config", "inputs"}` request on stdin and reads `{"output"}` or
//! `{"error"}` from stdout.

use async_trait::async_trait;
use flowcore::{Document, Executor, ExecutorContext, NodeError, Value, WorkflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Executor reference prefix marking an extension locator
pub const PLUGIN_PREFIX: &str = "plugin:";

/// Factory name an extension must report during the handshake
pub const FACTORY_ENTRY_POINT: &str = "new_executor";

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Handshake {
    factory: String,
    protocol: u32,
    #[serde(default)]
    executor_type: Option<String>,
}

#[derive(Serialize)]
struct PluginRequest<'a> {
    config: &'a Document,
    inputs: &'a Document,
}

#[derive(Debug, Deserialize)]
struct PluginResponse {
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Load an extension and verify it exposes the executor factory
pub async fn load_plugin(path: &Path) -> Result<PluginExecutor, WorkflowError> {
    let locator = path.display().to_string();
    tracing::debug!("Loading extension executor: {}", locator);

    let output = Command::new(path)
        .arg("describe")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| WorkflowError::ExtensionLoad {
            path: locator.clone(),
            reason: e.to_string(),
        })?;

    let contract_error = |reason: String| WorkflowError::ExtensionContract {
        path: locator.clone(),
        reason,
    };

    if !output.status.success() {
        return Err(contract_error(format!(
            "describe exited with {}",
            output.status
        )));
    }

    let handshake: Handshake = serde_json::from_slice(&output.stdout)
        .map_err(|e| contract_error(format!("invalid handshake: {}", e)))?;

    if handshake.factory != FACTORY_ENTRY_POINT {
        return Err(contract_error(format!(
            "expected factory '{}', found '{}'",
            FACTORY_ENTRY_POINT, handshake.factory
        )));
    }
    if handshake.protocol != PROTOCOL_VERSION {
        return Err(contract_error(format!(
            "unsupported protocol version {}",
            handshake.protocol
        )));
    }

    let executor_type = handshake
        .executor_type
        .unwrap_or_else(|| format!("{}{}", PLUGIN_PREFIX, locator));

    Ok(PluginExecutor {
        path: path.to_path_buf(),
        executor_type,
    })
}

/// Executor backed by an extension process
#[derive(Debug, Clone)]
pub struct PluginExecutor {
    path: PathBuf,
    executor_type: String,
}

impl PluginExecutor {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Executor for PluginExecutor {
    fn executor_type(&self) -> &str {
        &self.executor_type
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Value, NodeError> {
        let request = serde_json::to_vec(&PluginRequest {
            config: &ctx.config,
            inputs: &ctx.inputs,
        })
        .map_err(|e| NodeError::Execution(format!("failed to encode request: {}", e)))?;

        let mut child = Command::new(&self.path)
            .arg("execute")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NodeError::Execution(format!("failed to start extension: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .await
                .map_err(|e| NodeError::Execution(format!("failed to send request: {}", e)))?;
        }

        // Dropping the wait future kills the child.
        let output = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            output = child.wait_with_output() => output
                .map_err(|e| NodeError::Execution(format!("extension did not finish: {}", e)))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NodeError::Execution(format!(
                "extension exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let response: PluginResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| NodeError::ExtensionContract(format!("invalid response: {}", e)))?;

        match response {
            PluginResponse { error: Some(error), .. } => Err(NodeError::Execution(error)),
            PluginResponse { output: Some(output), .. } => Ok(output),
            PluginResponse { .. } => Err(NodeError::ExtensionContract(
                "response carries neither output nor error".to_string(),
            )),
        }
    }
}
