use std::time::Duration;

use nix::sys::resource::Usage;
use nix::sys::resource::UsageWho;
use nix::sys::resource::getrusage;
use nix::sys::wait::WaitPidFlag;
use nix::sys::wait::WaitStatus;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;

use crate::error::SandboxError;

pub fn snapshot() -> Result<Usage, SandboxError> {
    getrusage(UsageWho::RUSAGE_CHILDREN).map_err(SandboxError::Rusage)
}

/// `getrusage(RUSAGE_CHILDREN)` accumulates across every child the process
/// has reaped so far, not just the most recent one; taking before/after and
/// subtracting isolates the CPU time actually spent by one run, same as
/// reading `ru_maxrss` straight off `after` gives that run's peak RSS as
/// long as runs are reaped one at a time (true of the sequential
/// `number_of_runs` loop).
pub fn cpu_time(before: &Usage, after: &Usage) -> Duration {
    total_cpu(after).saturating_sub(total_cpu(before))
}

fn total_cpu(usage: &Usage) -> Duration {
    let user = timeval_to_duration(usage.user_time());
    let system = timeval_to_duration(usage.system_time());
    user + system
}

fn timeval_to_duration(tv: nix::sys::time::TimeVal) -> Duration {
    Duration::from_secs(tv.tv_sec().max(0) as u64) + Duration::from_micros(tv.tv_usec().max(0) as u64)
}

/// Peak RSS in KB. `ru_maxrss` is already KB on Linux; elsewhere (macOS/BSD)
/// it is bytes, so it is converted here to keep the rest of the crate
/// Linux-unit-agnostic.
pub fn peak_memory_kb(after: &Usage) -> u64 {
    let raw = after.max_rss().max(0) as u64;
    if cfg!(target_os = "linux") { raw } else { raw / 1024 }
}

pub enum ChildExit {
    Exited(i32),
    Signaled(i32),
}

/// Blocking wait for `pid`, non-blocking re-poll of `try_wait` is done by the
/// caller; this is the final, blocking reap once the caller has decided the
/// child is done or must be killed.
pub fn wait_blocking(pid: Pid) -> Result<ChildExit, SandboxError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ChildExit::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(ChildExit::Signaled(signal as i32)),
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(SandboxError::Rusage(e)),
        }
    }
}

/// Non-blocking poll used while racing the wall-clock deadline.
pub fn try_wait(pid: Pid) -> Result<Option<ChildExit>, SandboxError> {
    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => Ok(None),
        Ok(WaitStatus::Exited(_, code)) => Ok(Some(ChildExit::Exited(code))),
        Ok(WaitStatus::Signaled(_, signal, _)) => Ok(Some(ChildExit::Signaled(signal as i32))),
        Ok(_) => Ok(None),
        Err(nix::errno::Errno::EINTR) => Ok(None),
        Err(e) => Err(SandboxError::Rusage(e)),
    }
}
