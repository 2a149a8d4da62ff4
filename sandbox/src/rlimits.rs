use judge_protocol::submission::SandboxLimits;
use nix::sys::resource::Resource;
use nix::sys::resource::setrlimit;

use crate::error::SandboxError;

/// Applies the POSIX resource caps derived from `limits` to the *current*
/// process. Meant to run inside a freshly-forked child, via
/// `Command::pre_exec`, so it only ever affects that one child.
///
/// `RLIMIT_CPU` covers `cpu_time_limit + cpu_extra_time`; wall time has no
/// rlimit equivalent and is enforced by the caller's poll loop instead.
pub fn apply(limits: &SandboxLimits) -> Result<(), SandboxError> {
    let cpu_seconds = (limits.cpu_time_limit + limits.cpu_extra_time).ceil() as u64;
    setrlimit(Resource::RLIMIT_CPU, cpu_seconds, cpu_seconds)
        .map_err(|e| SandboxError::Rlimit("RLIMIT_CPU", e))?;

    let memory_bytes = limits.memory_limit.saturating_mul(1024);
    if limits.enable_per_process_and_thread_memory_limit {
        setrlimit(Resource::RLIMIT_AS, memory_bytes, memory_bytes)
            .map_err(|e| SandboxError::Rlimit("RLIMIT_AS", e))?;
    }

    let file_size_bytes = limits.max_file_size.saturating_mul(1024);
    setrlimit(Resource::RLIMIT_FSIZE, file_size_bytes, file_size_bytes)
        .map_err(|e| SandboxError::Rlimit("RLIMIT_FSIZE", e))?;

    let nproc = u64::from(limits.max_processes_and_or_threads);
    setrlimit(Resource::RLIMIT_NPROC, nproc, nproc).map_err(|e| SandboxError::Rlimit("RLIMIT_NPROC", e))?;

    // A handful of fds beyond the process cap for stdio plus whatever the
    // language runtime itself opens (shared libs, locale data, ...).
    let nofile = nproc.saturating_add(64);
    setrlimit(Resource::RLIMIT_NOFILE, nofile, nofile).map_err(|e| SandboxError::Rlimit("RLIMIT_NOFILE", e))?;

    setrlimit(Resource::RLIMIT_CORE, 0, 0).map_err(|e| SandboxError::Rlimit("RLIMIT_CORE", e))?;

    Ok(())
}
