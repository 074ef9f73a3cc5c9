use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl ExecutionResult {
    fn from_status(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            failure_reason: failure_reason(&status),
        }
    }

    /// Turns an unsuccessful run into a [`BuildError::CommandFailure`].
    pub fn into_result(self, program: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let reason = self
            .failure_reason
            .clone()
            .unwrap_or_else(|| "abnormal termination".to_string());
        Err(BuildError::command(format!("{:?} failed: {}", program, reason)))
    }
}

#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub stdout: String,
    pub result: ExecutionResult,
}

fn command(program: &str, args: &[String], dir: &Path, env: &[(String, String)]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .env_clear()
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    cmd
}

/// Runs `program` to completion, handing every line it prints on stdout or
/// stderr to `output_callback` as it arrives. Lines keep their terminator, a
/// trailing fragment is passed on as is and invalid UTF-8 is replaced rather
/// than ending the stream.
pub fn execute_step<F>(
    program: &str,
    args: &[String],
    dir: &Path,
    env: &[(String, String)],
    mut output_callback: F,
) -> Result<ExecutionResult>
where
    F: FnMut(String),
{
    let mut child = command(program, args, dir, env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BuildError::command(format!("failed to spawn {:?}: {}", program, e)))?;

    let (tx, rx) = mpsc::channel::<String>();

    let readers: Vec<thread::JoinHandle<()>> = [
        child.stdout.take().map(|s| Box::new(s) as Box<dyn Read + Send>),
        child.stderr.take().map(|s| Box::new(s) as Box<dyn Read + Send>),
    ]
    .into_iter()
    .flatten()
    .map(|stream| {
        let tx = tx.clone();
        thread::spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                }
            }
        })
    })
    .collect();
    drop(tx);

    for line in rx {
        output_callback(line);
    }

    for reader in readers {
        let _ = reader.join();
    }

    let status = child
        .wait()
        .map_err(|e| BuildError::command(format!("failed to wait for {:?}: {}", program, e)))?;

    Ok(ExecutionResult::from_status(status))
}

/// Runs `program` and collects its output instead of streaming it.
pub fn capture_output(
    program: &str,
    args: &[String],
    dir: &Path,
    env: &[(String, String)],
) -> Result<CapturedOutput> {
    let output = command(program, args, dir, env)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| BuildError::command(format!("failed to run {:?}: {}", program, e)))?;

    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        result: ExecutionResult::from_status(output.status),
    })
}

fn failure_reason(status: &ExitStatus) -> Option<String> {
    if status.success() {
        return None;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            let signal_name = match signal {
                1 => "SIGHUP",
                2 => "SIGINT",
                3 => "SIGQUIT",
                6 => "SIGABRT",
                9 => "SIGKILL",
                11 => "SIGSEGV",
                13 => "SIGPIPE",
                15 => "SIGTERM",
                _ => "unknown signal",
            };
            return Some(format!("terminated by signal {} ({})", signal, signal_name));
        }
    }

    status.code().map(|code| format!("exit code {}", code))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn env() -> Vec<(String, String)> {
        vec![("PATH".to_string(), std::env::var("PATH").unwrap_or_default())]
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_execute_step_streams_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines = Vec::new();
        let result = execute_step(
            "sh",
            &sh("echo out; echo err >&2"),
            dir.path(),
            &env(),
            |line| lines.push(line),
        )
        .unwrap();

        assert!(result.success);
        lines.sort();
        assert_eq!(lines, vec!["err\n", "out\n"]);
    }

    #[test]
    fn test_execute_step_survives_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let mut stdout = String::new();
        let result = execute_step(
            "sh",
            &sh("printf 'caf\\351\\n'; echo after; printf tail"),
            dir.path(),
            &env(),
            |chunk| stdout.push_str(&chunk),
        )
        .unwrap();

        assert!(result.success);
        assert_eq!(stdout, "caf\u{FFFD}\nafter\ntail");
    }

    #[test]
    fn test_execute_step_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute_step("sh", &sh("exit 3"), dir.path(), &env(), |_| {}).unwrap();

        assert!(!result.success);
        assert_eq!(result.failure_reason.as_deref(), Some("exit code 3"));
        assert!(result.into_result("sh").is_err());
    }

    #[test]
    fn test_environment_is_exactly_what_was_given() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = env();
        env.push(("BYGG_ONLY".to_string(), "yes".to_string()));

        let captured = capture_output("sh", &sh("echo $BYGG_ONLY:$HOME"), dir.path(), &env).unwrap();
        assert_eq!(captured.stdout, "yes:\n");
    }

    #[test]
    fn test_runs_in_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();

        let captured = capture_output("ls", &[], dir.path(), &env()).unwrap();
        assert!(captured.result.success);
        assert_eq!(captured.stdout, "marker\n");
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute_step("definitely-not-a-program", &[], dir.path(), &env(), |_| {});
        assert!(matches!(result, Err(BuildError::CommandFailure(_))));
    }
}
