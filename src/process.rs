use std::{
    ffi::OsStr,
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};

use tokio::{io::AsyncReadExt, process::Command};

use crate::error_code::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProcessError {
    #[error("Required command {0} not found in vid-rs' $PATH")]
    NotFound(String),

    #[error("The vid-rs user lacks permission to run {0}")]
    PermissionDenied(String),

    #[error("Process spawn limit reached")]
    LimitReached,

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0} failed with {1}")]
    Status(String, ExitStatus),

    #[error("Failed running process")]
    Other(#[source] std::io::Error),
}

impl ProcessError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::COMMAND_NOT_FOUND,
            Self::PermissionDenied(_) => ErrorCode::COMMAND_PERMISSION_DENIED,
            Self::LimitReached | Self::Other(_) => ErrorCode::COMMAND_ERROR,
            Self::Timeout(_) => ErrorCode::COMMAND_TIMEOUT,
            Self::Status(_, _) => ErrorCode::COMMAND_FAILURE,
        }
    }
}

struct MetricsGuard {
    start: Instant,
    armed: bool,
    command: String,
}

impl MetricsGuard {
    fn guard(command: String) -> Self {
        metrics::counter!("vid-rs.process.start", "command" => command.clone()).increment(1);

        Self {
            start: Instant::now(),
            armed: true,
            command,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for MetricsGuard {
    fn drop(&mut self) {
        metrics::histogram!(
            "vid-rs.process.duration",
            "command" => self.command.clone(),
            "completed" => (!self.armed).to_string(),
        )
        .record(self.start.elapsed().as_secs_f64());

        metrics::counter!(
            "vid-rs.process.end",
            "command" => self.command.clone(),
            "completed" => (!self.armed).to_string(),
        )
        .increment(1);
    }
}

/// A spawned external tool, bounded by the configured invocation timeout.
///
/// A hung tool would otherwise pin its request's task for good.
pub(crate) struct Process {
    command: String,
    child: tokio::process::Child,
    guard: MetricsGuard,
    timeout: Duration,
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("command", &self.command)
            .finish()
    }
}

impl Process {
    pub(crate) fn run<T>(command: &str, args: &[T], timeout: u64) -> Result<Self, ProcessError>
    where
        T: AsRef<OsStr>,
    {
        let spawned = tracing::trace_span!(parent: None, "Spawn command", %command).in_scope(|| {
            let guard = MetricsGuard::guard(command.into());

            Command::new(command)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map(|child| Process {
                    command: String::from(command),
                    child,
                    guard,
                    timeout: Duration::from_secs(timeout),
                })
        });

        spawned.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProcessError::NotFound(command.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ProcessError::PermissionDenied(command.to_string())
            }
            std::io::ErrorKind::WouldBlock => ProcessError::LimitReached,
            _ => ProcessError::Other(e),
        })
    }

    /// Wait for the tool to finish, requiring a clean exit.
    #[tracing::instrument(skip(self))]
    pub(crate) async fn wait(self) -> Result<(), ProcessError> {
        let Process {
            command,
            mut child,
            guard,
            timeout,
        } = self;

        let waited = tokio::time::timeout(timeout, child.wait()).await;

        match waited {
            Ok(Ok(status)) if status.success() => {
                guard.disarm();

                Ok(())
            }
            Ok(Ok(status)) => Err(ProcessError::Status(command, status)),
            Ok(Err(e)) => Err(ProcessError::Other(e)),
            Err(_) => {
                child.kill().await.map_err(ProcessError::Other)?;

                Err(ProcessError::Timeout(command))
            }
        }
    }

    /// Collect the tool's stdout, requiring a clean exit.
    ///
    /// A non-zero exit wins over whatever partial output was produced.
    #[tracing::instrument(skip(self))]
    pub(crate) async fn read_to_vec(self) -> Result<Vec<u8>, ProcessError> {
        let Process {
            command,
            mut child,
            guard,
            timeout,
        } = self;

        let mut stdout = child.stdout.take().expect("stdout exists");

        let waited = tokio::time::timeout(timeout, async {
            let mut output = Vec::new();
            stdout.read_to_end(&mut output).await?;

            child.wait().await.map(|status| (status, output))
        })
        .await;

        match waited {
            Ok(Ok((status, output))) if status.success() => {
                guard.disarm();

                Ok(output)
            }
            Ok(Ok((status, _))) => Err(ProcessError::Status(command, status)),
            Ok(Err(e)) => Err(ProcessError::Other(e)),
            Err(_) => {
                child.kill().await.map_err(ProcessError::Other)?;

                Err(ProcessError::Timeout(command))
            }
        }
    }
}
