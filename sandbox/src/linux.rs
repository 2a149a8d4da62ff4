//! Linux-only isolation mechanisms: Landlock (filesystem) and seccomp-bpf
//! (network). Both restrict the *calling thread*, so the caller must run
//! this on a throwaway thread dedicated to spawning one child, never on a
//! pooled worker thread.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use landlock::ABI;
use landlock::Access;
use landlock::AccessFs;
use landlock::CompatLevel;
use landlock::Compatible;
use landlock::Ruleset;
use landlock::RulesetAttr;
use landlock::RulesetCreatedAttr;
use landlock::RulesetStatus;
use seccompiler::BpfProgram;
use seccompiler::SeccompAction;
use seccompiler::SeccompCmpArgLen;
use seccompiler::SeccompCmpOp;
use seccompiler::SeccompCondition;
use seccompiler::SeccompFilter;
use seccompiler::SeccompRule;
use seccompiler::TargetArch;
use seccompiler::apply_filter;

use crate::error::SandboxError;

/// Installs filesystem containment and (if `enable_network` is false)
/// network denial on the current thread. Must be called on a dedicated
/// thread immediately before spawning the one child it is meant to confine.
pub fn apply_sandbox_policy_to_current_thread(
    scratch_dir: &Path,
    extra_read_roots: &[PathBuf],
    enable_network: bool,
) -> Result<(), SandboxError> {
    if !enable_network {
        install_network_seccomp_filter_on_current_thread()?;
    }
    install_filesystem_landlock_rules_on_current_thread(scratch_dir, extra_read_roots)?;
    Ok(())
}

/// Read access is granted to `scratch_dir` plus `extra_read_roots` (compiler
/// / interpreter install prefixes, dynamic linker caches); write access is
/// restricted to `scratch_dir` and `/dev/null`.
fn install_filesystem_landlock_rules_on_current_thread(
    scratch_dir: &Path,
    extra_read_roots: &[PathBuf],
) -> Result<(), SandboxError> {
    let abi = ABI::V5;
    let access_rw = AccessFs::from_all(abi);
    let access_ro = AccessFs::from_read(abi);

    let mut read_roots: Vec<PathBuf> = vec![scratch_dir.to_path_buf()];
    read_roots.extend(extra_read_roots.iter().cloned());

    let ruleset = Ruleset::default()
        .set_compatibility(CompatLevel::BestEffort)
        .handle_access(access_rw)?
        .create()?
        .add_rules(landlock::path_beneath_rules(&read_roots, access_ro))?
        .add_rules(landlock::path_beneath_rules(&["/dev/null"], access_rw))?
        .add_rules(landlock::path_beneath_rules(&[scratch_dir], access_rw))?
        .set_no_new_privs(true);

    let status = ruleset.restrict_self()?;

    if status.ruleset == RulesetStatus::NotEnforced {
        return Err(SandboxError::LandlockNotEnforced);
    }

    Ok(())
}

/// Blocks outbound network syscalls outright except `socket(AF_UNIX, ...)`.
fn install_network_seccomp_filter_on_current_thread() -> Result<(), SandboxError> {
    let mut rules: BTreeMap<i64, Vec<SeccompRule>> = BTreeMap::new();

    let mut deny_syscall = |nr: i64| {
        rules.insert(nr, vec![]);
    };

    deny_syscall(libc::SYS_connect);
    deny_syscall(libc::SYS_accept);
    deny_syscall(libc::SYS_accept4);
    deny_syscall(libc::SYS_bind);
    deny_syscall(libc::SYS_listen);
    deny_syscall(libc::SYS_getpeername);
    deny_syscall(libc::SYS_getsockname);
    deny_syscall(libc::SYS_shutdown);
    deny_syscall(libc::SYS_sendto);
    deny_syscall(libc::SYS_sendmsg);
    deny_syscall(libc::SYS_sendmmsg);
    deny_syscall(libc::SYS_recvfrom);
    deny_syscall(libc::SYS_recvmsg);
    deny_syscall(libc::SYS_recvmmsg);
    deny_syscall(libc::SYS_getsockopt);
    deny_syscall(libc::SYS_setsockopt);
    deny_syscall(libc::SYS_ptrace);

    let unix_only_rule = SeccompRule::new(vec![SeccompCondition::new(
        0,
        SeccompCmpArgLen::Dword,
        SeccompCmpOp::Eq,
        libc::AF_UNIX as u64,
    )?])?;

    rules.insert(libc::SYS_socket, vec![unix_only_rule]);
    rules.insert(libc::SYS_socketpair, vec![]);

    let filter = SeccompFilter::new(
        rules,
        SeccompAction::Allow,
        SeccompAction::Errno(libc::EPERM as u32),
        if cfg!(target_arch = "x86_64") {
            TargetArch::x86_64
        } else if cfg!(target_arch = "aarch64") {
            TargetArch::aarch64
        } else {
            return Err(SandboxError::UnsupportedPlatform);
        },
    )?;

    let prog: BpfProgram = filter.try_into()?;
    apply_filter(&prog)?;

    Ok(())
}
