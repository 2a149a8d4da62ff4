use std::path::PathBuf;

use judge_protocol::submission::SandboxLimits;
use nix::sys::signal::Signal;

use crate::error::SandboxError;
use crate::spawn;
use crate::spawn::SingleRunOutput;

/// One invocation request: an argv, its working directory, a set of
/// additional read-only roots a compiler/interpreter needs beyond the
/// scratch directory, optional stdin, an environment, and the resource caps
/// to enforce.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub command: Vec<String>,
    pub cwd: PathBuf,
    pub extra_read_roots: Vec<PathBuf>,
    pub stdin: Option<Vec<u8>>,
    pub env: Vec<(String, String)>,
    pub limits: SandboxLimits,
}

/// The outcome of running `SandboxSpec.command` (possibly `number_of_runs`
/// times). `exit_code` is set iff the process exited normally; `signal` iff
/// killed by a signal; `message` classifies the run for display.
#[derive(Debug, Clone)]
pub struct SandboxResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub time: f64,
    pub memory: u64,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub message: String,
}

/// Executes `spec.command` under sandbox isolation, `spec.limits.number_of_runs`
/// times sequentially. Reports the slowest `time` and maximum `memory` across
/// runs; `stdout`/`stderr` come from the last run executed. A non-zero exit
/// or a kill stops further runs (§4.1).
///
/// Returns `Err` only when the sandbox mechanism itself failed to start the
/// process (missing binary, Landlock/seccomp install failure, fork failure).
/// A killed or non-zero-exit run is still `Ok`.
pub async fn run(spec: SandboxSpec) -> Result<SandboxResult, SandboxError> {
    let mut runs_remaining = spec.limits.number_of_runs.max(1);

    let mut slowest = 0.0f64;
    let mut peak_memory = 0u64;

    // `runs_remaining` is clamped to >= 1 above, so this loop always runs at
    // least once and `last` is always initialized by the time it breaks.
    let last = loop {
        let run_spec = spec.clone();
        let output = tokio::task::spawn_blocking(move || {
            spawn::run_once(
                &run_spec.command,
                &run_spec.cwd,
                &run_spec.extra_read_roots,
                run_spec.stdin.as_deref(),
                &run_spec.env,
                &run_spec.limits,
            )
        })
        .await
        .map_err(|_| SandboxError::ThreadJoin)??;

        slowest = slowest.max(output.wall_time.as_secs_f64());
        peak_memory = peak_memory.max(output.memory_kb);

        let stop = output.signal.is_some() || output.exit_code != Some(0) || output.timed_out_wall;
        runs_remaining -= 1;
        if stop || runs_remaining == 0 {
            break output;
        }
    };

    let message = classify(&spec.limits, &last, slowest);
    let signal = last.signal.map(signal_name);

    Ok(SandboxResult {
        stdout: last.stdout,
        stderr: last.stderr,
        time: slowest,
        memory: peak_memory,
        exit_code: last.exit_code,
        signal,
        message,
    })
}

fn classify(limits: &SandboxLimits, last: &SingleRunOutput, slowest_time: f64) -> String {
    if last.timed_out_wall {
        return "Time limit exceeded".to_string();
    }
    if let Some(sig) = last.signal {
        let cpu_time_exceeded = last.cpu_time.as_secs_f64() >= limits.cpu_time_limit + limits.cpu_extra_time;
        if cpu_time_exceeded || sig == libc::SIGXCPU {
            return "Time limit exceeded".to_string();
        }
        if limits.enable_per_process_and_thread_memory_limit && last.memory_kb >= limits.memory_limit {
            return "Memory limit exceeded".to_string();
        }
        return "Runtime error".to_string();
    }
    if slowest_time >= limits.wall_time_limit {
        return "Time limit exceeded".to_string();
    }
    match last.exit_code {
        Some(0) => "OK".to_string(),
        _ => "Runtime error".to_string(),
    }
}

fn signal_name(raw: i32) -> String {
    Signal::try_from(raw)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{raw}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn default_limits() -> SandboxLimits {
        SandboxLimits {
            cpu_time_limit: 2.0,
            cpu_extra_time: 0.5,
            wall_time_limit: 2.0,
            memory_limit: 128_000,
            max_processes_and_or_threads: 32,
            max_file_size: 10_240,
            number_of_runs: 1,
            enable_per_process_and_thread_time_limit: false,
            enable_per_process_and_thread_memory_limit: false,
            redirect_stderr_to_stdout: false,
            enable_network: false,
        }
    }

    fn spec(command: &[&str], cwd: &std::path::Path, limits: SandboxLimits) -> SandboxSpec {
        SandboxSpec {
            command: command.iter().map(|s| s.to_string()).collect(),
            cwd: cwd.to_path_buf(),
            extra_read_roots: vec![PathBuf::from("/usr"), PathBuf::from("/lib"), PathBuf::from("/bin")],
            stdin: None,
            env: vec![("PATH".to_string(), "/usr/bin:/bin".to_string())],
            limits,
        }
    }

    #[tokio::test]
    async fn runs_a_simple_command_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(spec(&["/bin/echo", "hello"], dir.path(), default_limits()))
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.message, "OK");
        assert_eq!(String::from_utf8_lossy(&result.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn kills_a_process_that_exceeds_wall_time_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut limits = default_limits();
        limits.wall_time_limit = 0.2;
        limits.cpu_time_limit = 5.0;
        let result = run(spec(&["/bin/sleep", "5"], dir.path(), limits)).await.unwrap();
        assert_eq!(result.message, "Time limit exceeded");
        assert!(result.signal.is_some());
    }

    #[tokio::test]
    async fn reports_nonzero_exit_as_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(spec(&["/bin/sh", "-c", "exit 7"], dir.path(), default_limits()))
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(7));
        assert_eq!(result.message, "Runtime error");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn cannot_write_outside_the_scratch_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::NamedTempFile::new().unwrap();
        let cmd = format!("echo denied > {}", outside.path().to_string_lossy());
        let result = run(spec(&["/bin/sh", "-c", &cmd], dir.path(), default_limits()))
            .await
            .unwrap();
        assert_ne!(result.exit_code, Some(0));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn can_write_inside_the_scratch_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inside = dir.path().join("out.txt");
        let cmd = format!("echo allowed > {}", inside.to_string_lossy());
        let result = run(spec(&["/bin/sh", "-c", &cmd], dir.path(), default_limits()))
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(std::fs::read_to_string(inside).unwrap().trim(), "allowed");
    }
}
