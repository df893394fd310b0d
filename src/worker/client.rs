//! Async client for the database worker process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};

use super::error::{WorkerError, WorkerResult};
use super::protocol::{RequestEnvelope, ResponseEnvelope};
use crate::config::Settings;

/// Request timeout when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Responses a request can end with: the worker's envelope, or the worker
/// disappearing first.
type Reply = Option<ResponseEnvelope>;

/// Requests waiting for a response, keyed by request id.
#[derive(Clone, Default)]
struct Pending(Arc<Mutex<HashMap<String, oneshot::Sender<Reply>>>>);

impl Pending {
    async fn register(&self, id: String) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.0.lock().await.insert(id, tx);
        rx
    }

    async fn forget(&self, id: &str) {
        self.0.lock().await.remove(id);
    }

    async fn resolve(&self, response: ResponseEnvelope) {
        match self.0.lock().await.remove(&response.id) {
            Some(tx) => {
                let _ = tx.send(Some(response));
            }
            None => tracing::debug!(id = %response.id, "dropping response for unknown request"),
        }
    }

    /// Wake every waiting request with "worker exited".
    async fn fail_all(&self) {
        for (_, tx) in self.0.lock().await.drain() {
            let _ = tx.send(None);
        }
    }
}

/// Client for the database worker.
///
/// The worker runs as a child process speaking NDJSON over stdin/stdout.
/// Requests carry a uuid so that several search runs can share one worker,
/// each with its own transaction, without their responses getting mixed up.
///
/// ```ignore
/// use keyscout::worker::{protocol::*, WorkerClient};
///
/// let client = WorkerClient::spawn("./keyscout-worker").await?;
/// let tx: BeginTransactionResponse = client
///     .request(
///         methods::BEGIN_TRANSACTION,
///         Scoped::new(&connection, BeginTransaction { read_only: true }),
///     )
///     .await?;
/// ```
pub struct WorkerClient {
    stdin: Mutex<BufWriter<ChildStdin>>,
    pending: Pending,
    _child: Child,
    reader_task: tokio::task::JoinHandle<()>,
    timeout: Duration,
}

impl WorkerClient {
    /// Spawn a worker with default pool settings and timeout.
    pub async fn spawn<P: AsRef<Path>>(worker_path: P) -> WorkerResult<Self> {
        Self::spawn_with_args(worker_path, &[], DEFAULT_TIMEOUT).await
    }

    /// Spawn the worker described by the `[worker]` settings section.
    pub async fn spawn_with_settings(settings: &Settings) -> WorkerResult<Self> {
        let worker_path = Self::resolve_worker_path(settings)?;
        let pool_args = settings.worker.pool.to_worker_args();
        let timeout = Duration::from_secs(settings.worker.timeout_seconds);

        Self::spawn_with_args(&worker_path, &pool_args, timeout).await
    }

    fn resolve_worker_path(settings: &Settings) -> WorkerResult<PathBuf> {
        settings.worker_path().ok_or_else(|| WorkerError::Spawn {
            path: settings
                .worker
                .path
                .clone()
                .unwrap_or_else(|| "keyscout-worker".to_string()),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "set worker.path in the config or put keyscout-worker on PATH",
            ),
        })
    }

    /// Spawn a worker with explicit arguments and request timeout.
    pub async fn spawn_with_args<P: AsRef<Path>>(
        worker_path: P,
        args: &[String],
        timeout: Duration,
    ) -> WorkerResult<Self> {
        let path = worker_path.as_ref();
        let spawn_error = |source| WorkerError::Spawn {
            path: path.display().to_string(),
            source,
        };

        let mut child = Command::new(path)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(spawn_error(std::io::Error::other("worker pipes not captured")));
        };

        let pending = Pending::default();
        let reader_task = tokio::spawn(Self::read_responses(stdout, pending.clone()));

        tracing::debug!(path = %path.display(), ?args, "spawned worker");

        Ok(Self {
            stdin: Mutex::new(BufWriter::new(stdin)),
            pending,
            _child: child,
            reader_task,
            timeout,
        })
    }

    /// Route responses to their requests until the worker's stdout closes.
    async fn read_responses(stdout: ChildStdout, pending: Pending) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match serde_json::from_str::<ResponseEnvelope>(&line) {
                    Ok(response) => pending.resolve(response).await,
                    Err(e) => tracing::warn!(error = %e, "unparseable worker response"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "worker stdout read failed");
                    break;
                }
            }
        }
        tracing::debug!("worker output closed");
        pending.fail_all().await;
    }

    /// Send `method` with `params` and wait for the typed result.
    pub async fn request<P, R>(&self, method: &str, params: P) -> WorkerResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let encode = |source| WorkerError::Encode {
            method: method.to_string(),
            source,
        };

        let id = uuid::Uuid::new_v4().to_string();
        let request = RequestEnvelope {
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params).map_err(encode)?,
        };
        let mut line = serde_json::to_string(&request).map_err(encode)?;
        line.push('\n');

        let reply = self.pending.register(id.clone()).await;
        if !self.is_alive() {
            self.pending.forget(&id).await;
            return Err(WorkerError::Exited);
        }
        if let Err(e) = self.write_line(&line).await {
            self.pending.forget(&id).await;
            return Err(e);
        }

        let response = match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(Some(response))) => response,
            Ok(Ok(None)) | Ok(Err(_)) => return Err(WorkerError::Exited),
            Err(_) => {
                // A late response for this id is then dropped by the reader.
                self.pending.forget(&id).await;
                return Err(WorkerError::Timeout {
                    method: method.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !response.success {
            return Err(match response.error {
                Some(error) => WorkerError::from_remote(&error.code, error.message),
                None => WorkerError::from_remote("UNKNOWN", "error response without details"),
            });
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(|source| WorkerError::Decode {
            method: method.to_string(),
            source,
        })
    }

    async fn write_line(&self, line: &str) -> WorkerResult<()> {
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(WorkerError::Pipe)?;
        stdin.flush().await.map_err(WorkerError::Pipe)
    }

    /// Whether the worker's output is still being read.
    pub fn is_alive(&self) -> bool {
        !self.reader_task.is_finished()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
