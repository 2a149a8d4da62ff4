use std::io::Read;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use judge_protocol::submission::SandboxLimits;
use nix::sys::signal::Signal;
use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::error::SandboxError;
use crate::rlimits;
use crate::telemetry;
use crate::telemetry::ChildExit;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct SingleRunOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub wall_time: Duration,
    pub cpu_time: Duration,
    pub memory_kb: u64,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out_wall: bool,
}

/// Runs one invocation to completion. Must be called on a throwaway OS
/// thread: on Linux it installs Landlock/seccomp on the calling thread
/// before spawning, which would otherwise leak onto a pooled worker thread.
pub fn run_once(
    command: &[String],
    cwd: &Path,
    extra_read_roots: &[PathBuf],
    stdin: Option<&[u8]>,
    env: &[(String, String)],
    limits: &SandboxLimits,
) -> Result<SingleRunOutput, SandboxError> {
    #[cfg(target_os = "linux")]
    crate::linux::apply_sandbox_policy_to_current_thread(cwd, extra_read_roots, limits.enable_network)?;

    let limits_for_child = *limits;
    let mut cmd = Command::new(&command[0]);
    cmd.args(&command[1..])
        .current_dir(cwd)
        .env_clear()
        .envs(env.iter().cloned())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    unsafe {
        cmd.pre_exec(move || {
            rlimits::apply(&limits_for_child).map_err(std::io::Error::other)?;
            Ok(())
        });
    }

    let usage_before = telemetry::snapshot()?;
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(SandboxError::Spawn)?;
    let pid = Pid::from_raw(child.id() as i32);

    let mut stdin_pipe = child.stdin.take();
    let stdin_owned = stdin.map(<[u8]>::to_vec);
    let stdin_writer = std::thread::spawn(move || {
        if let (Some(mut pipe), Some(bytes)) = (stdin_pipe.take(), stdin_owned) {
            let _ = pipe.write_all(&bytes);
        }
    });

    let mut stdout_pipe = child.stdout.take();
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let mut stderr_pipe = child.stderr.take();
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let wall_time_limit = Duration::from_secs_f64(limits.wall_time_limit.max(0.0));
    let mut timed_out_wall = false;
    let exit = loop {
        if let Some(exit) = telemetry::try_wait(pid)? {
            break exit;
        }
        if start.elapsed() > wall_time_limit {
            let _ = kill(pid, Signal::SIGKILL);
            timed_out_wall = true;
            break telemetry::wait_blocking(pid)?;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let wall_time = start.elapsed();
    let usage_after = telemetry::snapshot()?;
    let cpu_time = telemetry::cpu_time(&usage_before, &usage_after);
    let memory_kb = telemetry::peak_memory_kb(&usage_after);

    let _ = stdin_writer.join();
    let mut stdout = stdout_reader.join().unwrap_or_default();
    let mut stderr = stderr_reader.join().unwrap_or_default();
    if limits.redirect_stderr_to_stdout {
        stdout.append(&mut stderr);
    }

    let (exit_code, signal) = match exit {
        ChildExit::Exited(code) => (Some(code), None),
        ChildExit::Signaled(sig) => (None, Some(sig)),
    };

    Ok(SingleRunOutput {
        stdout,
        stderr,
        wall_time,
        cpu_time,
        memory_kb,
        exit_code,
        signal,
        timed_out_wall,
    })
}
