//! Edge Impulse `.eim` model runner client
//!
//! The `.eim` file is a self-contained executable. Started with a socket path
//! argument, it listens on that Unix socket and answers JSON requests:
//!
//! - `{"hello": 1, "id": n}` returns `model_parameters`
//! - `{"classify": [...], "id": n}` returns `result.classification`
//!
//! Each response is a JSON object terminated by a NUL byte.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};

use crate::services::inference::{EngineError, InferenceEngine, ModelInfo, ModelLoader};

const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct RunnerResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    model_parameters: Option<ModelParameters>,
    #[serde(default)]
    result: Option<ClassifyResult>,
}

#[derive(Debug, Deserialize)]
struct ModelParameters {
    input_features_count: usize,
    frequency: f64,
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResult {
    #[serde(default)]
    classification: HashMap<String, f64>,
}

/// Starts `.eim` runners
#[derive(Debug, Clone)]
pub struct EimLoader {
    /// Bound on startup and on each request
    timeout: Duration,
}

impl EimLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for EimLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl ModelLoader for EimLoader {
    async fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceEngine>, EngineError> {
        let runner = EimRunner::start(model_path, self.timeout).await?;
        Ok(Box::new(runner))
    }
}

/// Running `.eim` process plus its socket connection
pub struct EimRunner {
    // Held so the process lives as long as the connection; killed on drop.
    _child: Child,
    stream: BufReader<UnixStream>,
    socket_path: PathBuf,
    info: ModelInfo,
    next_id: u64,
    timeout: Duration,
}

impl EimRunner {
    /// Spawn the runner, connect and perform the hello handshake
    pub async fn start(model_path: &Path, timeout: Duration) -> Result<Self, EngineError> {
        if !model_path.exists() {
            return Err(EngineError::ModelNotFound(model_path.display().to_string()));
        }

        let socket_path =
            std::env::temp_dir().join(format!("nmon-eim-{}.sock", uuid::Uuid::new_v4()));

        let mut child = Command::new(model_path)
            .arg(&socket_path)
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stream = match connect_when_ready(&socket_path, &mut child, timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = std::fs::remove_file(&socket_path);
                return Err(e);
            }
        };

        let mut runner = Self {
            _child: child,
            stream: BufReader::new(stream),
            socket_path,
            info: ModelInfo {
                window_len: 0,
                sample_rate: 0,
                labels: Vec::new(),
            },
            next_id: 1,
            timeout,
        };

        let hello = runner.request(|id| json!({ "hello": 1, "id": id })).await?;
        let params = hello
            .model_parameters
            .ok_or_else(|| EngineError::Protocol("hello response without model_parameters".into()))?;

        if params.input_features_count == 0 {
            return Err(EngineError::Protocol("model reports zero input features".into()));
        }

        runner.info = ModelInfo {
            window_len: params.input_features_count,
            sample_rate: params.frequency.round() as u32,
            labels: params.labels,
        };

        tracing::info!(
            model = %model_path.display(),
            window_len = runner.info.window_len,
            sample_rate = runner.info.sample_rate,
            labels = ?runner.info.labels,
            "Model loaded"
        );

        Ok(runner)
    }

    async fn request<F>(&mut self, build: F) -> Result<RunnerResponse, EngineError>
    where
        F: FnOnce(u64) -> serde_json::Value,
    {
        let id = self.next_id;
        self.next_id += 1;

        let payload = serde_json::to_vec(&build(id))
            .map_err(|e| EngineError::Protocol(format!("encode request: {}", e)))?;

        let timeout = self.timeout;
        let stream = &mut self.stream;
        let exchange = async move {
            stream.get_mut().write_all(&payload).await?;
            let mut raw = Vec::new();
            let n = stream.read_until(0, &mut raw).await?;
            Ok::<_, std::io::Error>((n, raw))
        };

        let (n, mut raw) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| EngineError::Protocol(format!("request {} timed out", id)))??;

        if n == 0 {
            return Err(EngineError::Protocol("runner closed the connection".into()));
        }
        if raw.last() == Some(&0) {
            raw.pop();
        }

        let response: RunnerResponse = serde_json::from_slice(&raw)
            .map_err(|e| EngineError::Protocol(format!("decode response: {}", e)))?;

        if !response.success {
            return Err(EngineError::Remote(
                response.error.unwrap_or_else(|| "unspecified failure".into()),
            ));
        }

        Ok(response)
    }
}

/// Poll the socket until the runner listens, the child exits, or time runs out
async fn connect_when_ready(
    socket_path: &Path,
    child: &mut Child,
    timeout: Duration,
) -> Result<UnixStream, EngineError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if let Some(status) = child.try_wait()? {
                    return Err(EngineError::Connect(format!(
                        "runner exited with {} before listening",
                        status
                    )));
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(EngineError::Connect(e.to_string()));
                }
            }
        }
        tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
    }
}

#[async_trait]
impl InferenceEngine for EimRunner {
    fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    async fn classify_window(
        &mut self,
        window: &[i16],
    ) -> Result<HashMap<String, f64>, EngineError> {
        let response = self
            .request(|id| json!({ "classify": window, "id": id }))
            .await?;

        response
            .result
            .map(|r| r.classification)
            .ok_or_else(|| EngineError::Protocol("classify response without result".into()))
    }
}

impl Drop for EimRunner {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
