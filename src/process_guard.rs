//! Lifecycle management for spawned task processes
//!
//! A migration task can run arbitrary commands against the target
//! environment. If task-migrate dies or is interrupted mid-run, those commands
//! must not keep going unsupervised, so every task process:
//!
//! - is spawned as the leader of its own process group, unless it shares
//!   our controlling terminal
//! - receives SIGTERM if its parent dies (`PR_SET_PDEATHSIG`)
//! - is tracked in the global [`ChildRegistry`] while it runs
//!
//! On SIGINT/SIGTERM/SIGHUP the signal thread terminates every tracked group
//! (SIGTERM, grace period, then SIGKILL) and exits with `128 + signal`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, error, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Grace period given to task processes after SIGTERM on interrupt
pub const INTERRUPT_GRACE: Duration = Duration::from_secs(3);

/// PIDs of task processes that are currently running
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Process-wide registry shared with the signal thread
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("tracking task process {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("task process {} finished", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate every tracked process group.
    ///
    /// Sends SIGTERM, waits up to `grace_period` for the groups to exit, then
    /// SIGKILLs whatever is left. Only the first call does anything.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            return;
        }

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        info!("terminating {} running task process(es)", pids.len());

        for &pid in &pids {
            if let Err(e) = signal_group(pid, Signal::SIGTERM) {
                warn!("failed to SIGTERM process group {}: {}", pid, e);
                let _ = signal_pid(pid, Signal::SIGTERM);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if !pids.iter().any(|&pid| is_process_alive(pid)) {
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in pids.iter().filter(|&&pid| is_process_alive(pid)) {
            warn!("task process group {} ignored SIGTERM, sending SIGKILL", pid);
            if let Err(e) = signal_group(pid, Signal::SIGKILL) {
                error!("failed to SIGKILL process group {}: {}", pid, e);
                let _ = signal_pid(pid, Signal::SIGKILL);
            }
        }
        self.pids.clear();
    }
}

fn signal_pid(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

// Negative pid addresses the whole group, so commands started by the task
// runner are reached too.
fn signal_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Alive means present and neither zombie nor dead.
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the process state
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        if let Some(state) = stat.split_whitespace().nth(2) {
            return !matches!(state, "Z" | "X");
        }
    }
    true
}

/// Install SIGINT/SIGTERM/SIGHUP handlers that clean up task processes.
///
/// Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            warn!("received signal {}, stopping migration run", sig);
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(INTERRUPT_GRACE);
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait controlling how a [`std::process::Command`] relates to us
pub trait CommandProcessGroup {
    /// Own process group plus the parent death signal.
    fn in_new_process_group(&mut self) -> &mut Self;

    /// Parent death signal only; the child stays in our process group.
    ///
    /// Needed when the child shares our controlling terminal: a background
    /// group reading the terminal gets SIGTTIN and stops.
    fn with_parent_death_signal(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure only calls async-signal-safe functions
        // (setpgid, prctl) between fork and exec.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                set_parent_death_signal()
            });
        }
        self
    }

    fn with_parent_death_signal(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: prctl is async-signal-safe.
        unsafe {
            self.pre_exec(set_parent_death_signal);
        }
        self
    }
}

fn set_parent_death_signal() -> std::io::Result<()> {
    // SAFETY: PR_SET_PDEATHSIG takes a plain signal number.
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn wait_for_exit(child: &mut std::process::Child, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(_)) = child.try_wait() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();
        registry.register(1234);
        registry.register(5678);
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_terminate_all_kills_process_group() {
        let mut child = Command::new("sh")
            .args(["-c", "sleep 60"])
            .in_new_process_group()
            .spawn()
            .expect("failed to spawn sleep");

        let mut registry = ChildRegistry::default();
        registry.register(child.id());
        registry.terminate_all(Duration::from_millis(500));

        assert!(wait_for_exit(&mut child, Duration::from_secs(2)));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.register(999_999);
        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.cleanup_initiated);

        registry.register(999_998);
        registry.terminate_all(Duration::from_millis(10));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(999_999));
    }

    #[test]
    fn test_new_process_group_leader() {
        let mut child = Command::new("sh")
            .args(["-c", "exit 0"])
            .in_new_process_group()
            .spawn()
            .expect("failed to spawn sh");
        assert!(child.wait().unwrap().success());
    }

    #[test]
    fn test_parent_death_signal_keeps_process_group() {
        let output = Command::new("sh")
            .args(["-c", "ps -o pgid= -p $$"])
            .with_parent_death_signal()
            .output()
            .expect("failed to spawn sh");
        assert!(output.status.success());

        let child_pgid: i32 = String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .expect("pgid from ps");
        assert_eq!(child_pgid, nix::unistd::getpgrp().as_raw());
    }
}
