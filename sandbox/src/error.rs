use thiserror::Error;

/// Errors the sandbox mechanism itself can raise. These are distinct from a
/// *completed* run (even a killed one, which is still `Ok(SandboxResult)`);
/// a `SandboxError` means the sandbox could not be started or its isolation
/// could not be enforced at all (§4.1 "Failure modes").
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to spawn sandboxed process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("io error while supervising sandboxed process: {0}")]
    Io(#[source] std::io::Error),

    #[error("supervisor thread panicked")]
    ThreadJoin,

    #[cfg(target_os = "linux")]
    #[error("failed to install landlock ruleset")]
    Landlock(#[from] landlock::RulesetError),

    #[cfg(target_os = "linux")]
    #[error("failed to resolve landlock path: {0}")]
    LandlockPath(#[from] landlock::PathFdError),

    #[error("landlock ruleset was not fully enforced by the kernel")]
    LandlockNotEnforced,

    #[cfg(target_os = "linux")]
    #[error("failed to compile seccomp filter: {0}")]
    SeccompFilter(#[from] seccompiler::Error),

    #[cfg(target_os = "linux")]
    #[error("failed to install seccomp filter: {0}")]
    SeccompBackend(#[from] seccompiler::BackendError),

    #[error("failed to read resource usage: {0}")]
    Rusage(#[source] nix::Error),

    #[error("failed to apply rlimit {0}: {1}")]
    Rlimit(&'static str, #[source] nix::Error),

    #[error("sandboxing is not supported on this platform")]
    UnsupportedPlatform,
}
