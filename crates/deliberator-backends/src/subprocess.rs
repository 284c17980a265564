//! Subprocess backend adapter with an activity-based timeout: two concurrent
//! readers drain stdout/stderr, a supervisor kills the process tree if either
//! the process goes quiet for `activity_timeout` or the call runs past
//! `hard_timeout`, whichever comes first.

use crate::cleanup::clean_stdout;
use crate::error::{BackendError, BackendResult};
use crate::invoke::{Invoke, InvokeRequest};
use crate::retry::{backoff_delay, is_transient_message};
use crate::template::render_args;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

const DEFAULT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_PROMPT_CHARS: usize = 100_000;
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(2);

enum TimeoutKind {
    Activity,
    Hard,
}

pub struct SubprocessAdapter {
    backend_id: String,
    command: String,
    args_template: Vec<String>,
    hard_timeout: Duration,
    activity_timeout: Duration,
    max_retries: u32,
    max_prompt_chars: usize,
}

impl SubprocessAdapter {
    pub fn new(backend_id: String, command: String, args_template: Vec<String>, hard_timeout: Duration) -> Self {
        Self {
            backend_id,
            command,
            args_template,
            activity_timeout: DEFAULT_ACTIVITY_TIMEOUT.min(hard_timeout),
            hard_timeout,
            max_retries: 3,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn run_once(&self, request: &InvokeRequest) -> BackendResult<String> {
        let args = render_args(&self.args_template, request);

        let mut cmd = Command::new(&self.command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_directory {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    libc::setpgid(0, 0);
                    Ok(())
                });
            }
        }

        let start = Instant::now();
        let mut child = cmd.spawn()?;
        let pid = child.id();
        let mut stdout = child.stdout.take().expect("stdout is piped");
        let mut stderr = child.stderr.take().expect("stderr is piped");

        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let stdout_task = {
            let last_activity = last_activity.clone();
            tokio::spawn(async move { drain(&mut stdout, last_activity).await })
        };
        let stderr_task = {
            let last_activity = last_activity.clone();
            tokio::spawn(async move { drain(&mut stderr, last_activity).await })
        };

        let activity_timeout = self.activity_timeout;
        let hard_timeout = self.hard_timeout;
        let supervisor_last_activity = last_activity.clone();
        let supervisor = tokio::spawn(async move {
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                if start.elapsed() > hard_timeout {
                    kill_process_tree(pid).await;
                    return TimeoutKind::Hard;
                }
                let since_activity = supervisor_last_activity.lock().expect("lock poisoned").elapsed();
                if since_activity > activity_timeout {
                    kill_process_tree(pid).await;
                    return TimeoutKind::Activity;
                }
            }
        });

        debug!(backend = %self.backend_id, command = %self.command, "backend subprocess started");

        let status = tokio::select! {
            status = child.wait() => {
                supervisor.abort();
                status?
            }
            timeout_result = supervisor => {
                let _ = child.wait().await;
                stdout_task.abort();
                stderr_task.abort();
                let duration = match timeout_result {
                    Ok(TimeoutKind::Hard) => hard_timeout,
                    _ => activity_timeout,
                };
                warn!(backend = %self.backend_id, ?duration, "backend subprocess timed out");
                return Err(BackendError::Timeout { duration });
            }
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let stdout_raw = String::from_utf8_lossy(&stdout_bytes).into_owned();
        let stderr_raw = String::from_utf8_lossy(&stderr_bytes).into_owned();

        debug!(backend = %self.backend_id, exit_code = status.code(), "backend subprocess done");

        if !status.success() {
            let first_line = stderr_raw.lines().next().unwrap_or("").to_string();
            return Err(BackendError::Runtime {
                backend_id: self.backend_id.clone(),
                message: first_line,
            });
        }

        Ok(clean_stdout(&stdout_raw))
    }
}

async fn drain(reader: &mut (impl tokio::io::AsyncRead + Unpin), last_activity: Arc<Mutex<Instant>>) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                *last_activity.lock().expect("lock poisoned") = Instant::now();
            }
        }
    }
    buf
}

async fn kill_process_tree(pid: Option<u32>) {
    let Some(pid) = pid else { return };

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(-(pid as i32));
        let _ = kill(pgid, Signal::SIGTERM);
        tokio::time::sleep(KILL_GRACE_PERIOD).await;
        let _ = kill(pgid, Signal::SIGKILL);
    }

    #[cfg(windows)]
    {
        let _ = tokio::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .output()
            .await;
    }
}

#[async_trait]
impl Invoke for SubprocessAdapter {
    async fn invoke(&self, request: &InvokeRequest) -> BackendResult<String> {
        if request.full_prompt().len() > self.max_prompt_chars {
            return Err(BackendError::PromptTooLong { max: self.max_prompt_chars });
        }

        let mut attempt = 0;
        loop {
            match self.run_once(request).await {
                Ok(text) => return Ok(text),
                Err(BackendError::Runtime { message, backend_id }) if attempt < self.max_retries && is_transient_message(&message) => {
                    attempt += 1;
                    warn!(backend = %backend_id, attempt, "transient backend failure, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_a_substituted_prompt() {
        let adapter = SubprocessAdapter::new(
            "echo-backend".to_string(),
            "echo".to_string(),
            vec!["{prompt}".to_string()],
            Duration::from_secs(5),
        );
        let request = InvokeRequest::new("hello there", "n/a");
        let response = adapter.invoke(&request).await.unwrap();
        assert_eq!(response, "hello there");
    }

    #[tokio::test]
    async fn activity_timeout_kills_a_hanging_process() {
        let adapter = SubprocessAdapter::new(
            "sleep-backend".to_string(),
            "sleep".to_string(),
            vec!["5".to_string()],
            Duration::from_millis(300),
        );
        let request = InvokeRequest::new("hi", "n/a");
        let result = adapter.invoke(&request).await;
        assert!(matches!(result, Err(BackendError::Timeout { .. })));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_first_stderr_line() {
        let adapter = SubprocessAdapter::new(
            "sh-backend".to_string(),
            "sh".to_string(),
            vec!["-c".to_string(), "echo boom 1>&2; exit 1".to_string()],
            Duration::from_secs(5),
        )
        .with_max_retries(0);
        let request = InvokeRequest::new("hi", "n/a");
        let result = adapter.invoke(&request).await;
        match result {
            Err(BackendError::Runtime { message, .. }) => assert_eq!(message, "boom"),
            other => panic!("expected Runtime error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn prompt_over_the_cap_is_rejected_before_spawning() {
        let mut adapter = SubprocessAdapter::new(
            "echo-backend".to_string(),
            "echo".to_string(),
            vec!["{prompt}".to_string()],
            Duration::from_secs(5),
        );
        adapter.max_prompt_chars = 10;
        let request = InvokeRequest::new("this prompt is far longer than ten characters", "n/a");
        let result = adapter.invoke(&request).await;
        assert!(matches!(result, Err(BackendError::PromptTooLong { max: 10 })));
    }
}
