use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::DriverError;

/// Result of a subprocess whose stdout and stderr were merged line by line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Captured {
    pub code: i32,
    pub log: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Find `name` on `PATH`, or accept it as-is when it is a path.
pub(crate) fn resolve_binary(name: &str) -> Result<PathBuf, DriverError> {
    which::which(name).map_err(|e| DriverError::BinaryNotFound {
        binary: name.to_string(),
        message: e.to_string(),
    })
}

/// Run a command with stdout and stderr merged into one log. Each line is
/// mirrored to `debug!` as it arrives.
pub(crate) async fn run_captured(mut cmd: Command, name: &str) -> Result<Captured, DriverError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| DriverError::Internal(format!("spawn {name}: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DriverError::Internal(format!("{name}: stdout was not piped")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| DriverError::Internal(format!("{name}: stderr was not piped")))?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let tx1 = tx.clone();
    let stdout_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = tx1.send(line);
        }
    });

    let tx2 = tx.clone();
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = tx2.send(line);
        }
    });

    drop(tx);

    let mut log = String::new();
    while let Some(line) = rx.recv().await {
        debug!("{name}: {line}");
        log.push_str(&line);
        log.push('\n');
    }

    stdout_task.await.ok();
    stderr_task.await.ok();

    let status = child
        .wait()
        .await
        .map_err(|e| DriverError::Internal(format!("wait {name}: {e}")))?;

    let code = status.code().unwrap_or(-1);
    if code != 0 {
        warn!(command = name, code, "command exited non-zero");
    }
    Ok(Captured { code, log })
}

/// Run a command attached to the user's terminal. Used when the tool must
/// ask its own questions, such as a terraform plan awaiting approval.
pub(crate) async fn run_interactive(mut cmd: Command, name: &str) -> Result<i32, DriverError> {
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    let status = cmd
        .status()
        .await
        .map_err(|e| DriverError::Internal(format!("spawn {name}: {e}")))?;
    Ok(status.code().unwrap_or(-1))
}

/// Run a command and return its stdout alone, failing on a non-zero exit.
pub(crate) async fn run_stdout(mut cmd: Command, name: &str) -> Result<String, DriverError> {
    cmd.stdin(Stdio::null());
    let output = cmd
        .output()
        .await
        .map_err(|e| DriverError::Internal(format!("spawn {name}: {e}")))?;
    let code = output.status.code().unwrap_or(-1);
    if code != 0 {
        debug!(command = name, code, stderr = %String::from_utf8_lossy(&output.stderr), "command failed");
        return Err(DriverError::CommandFailed { command: name.to_string(), code });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merges_stdout_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let captured = run_captured(cmd, "sh").await.unwrap();
        assert_eq!(captured.code, 3);
        assert!(!captured.success());
        assert!(captured.log.contains("out\n"));
        assert!(captured.log.contains("err\n"));
    }

    #[tokio::test]
    async fn stdout_only_on_success() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo value; echo noise 1>&2"]);
        assert_eq!(run_stdout(cmd, "sh").await.unwrap(), "value\n");

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 2"]);
        let err = run_stdout(cmd, "sh").await.unwrap_err();
        assert_eq!(err.to_string(), "sh exited with code 2");
    }

    #[test]
    fn missing_binary_is_reported() {
        let err = resolve_binary("definitely-not-a-real-binary-bbl").unwrap_err();
        assert!(matches!(err, DriverError::BinaryNotFound { .. }));
    }
}
