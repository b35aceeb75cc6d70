//! Cooperative resource limiting: wall-clock execution timeouts enforced by
//! a watchdog thread, plus best-effort OS memory/CPU ceilings on unix.
//!
//! Deadlines are armed per thread, so concurrent workers can each carry
//! their own timeout through one shared limiter. The watchdog never
//! interrupts an executor. It flags a thread when its deadline passes;
//! executing code observes the flag at [`checkpoint`] boundaries and
//! converts it into a `ResourceLimitExceeded` error.
//!
//! [`checkpoint`]: ResourceLimiter::checkpoint

use std::{
    collections::HashMap,
    sync::Arc,
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::runtime::error::RuntimeError;

enum Control {
    /// Deadlines changed; recompute the next wakeup.
    Poke,
    Shutdown,
}

struct Shared {
    /// Armed deadline and the duration it was armed with, per thread.
    deadlines: Mutex<HashMap<ThreadId, (Instant, Duration)>>,
    /// Threads whose deadline the watchdog saw pass, with the armed limit.
    expired: Mutex<HashMap<ThreadId, Duration>>,
}

impl Shared {
    fn earliest(&self) -> Option<Instant> {
        self.deadlines.lock().values().map(|(d, _)| *d).min()
    }

    /// Moves every passed deadline into the expired table.
    fn flag_expired(&self, now: Instant) {
        let mut deadlines = self.deadlines.lock();
        let mut expired = self.expired.lock();
        deadlines.retain(|tid, (deadline, limit)| {
            if now >= *deadline {
                expired.insert(*tid, *limit);
                false
            } else {
                true
            }
        });
    }
}

/// Wall-clock execution limiter shared by all invocations in a context.
///
/// One watchdog thread serves the whole limiter; each invoking thread arms
/// at most one deadline at a time.
pub struct ResourceLimiter {
    shared: Arc<Shared>,
    control: Sender<Control>,
    watchdog: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ResourceLimiter {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            deadlines: Mutex::new(HashMap::new()),
            expired: Mutex::new(HashMap::new()),
        });
        let (tx, rx) = unbounded::<Control>();

        let watchdog_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("naab-watchdog".to_string())
            .spawn(move || loop {
                let msg = match watchdog_shared.earliest() {
                    Some(deadline) => match rx.recv_deadline(deadline) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => {
                            watchdog_shared.flag_expired(Instant::now());
                            warn!("execution deadline passed, thread flagged");
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    },
                    None => match rx.recv() {
                        Ok(msg) => msg,
                        Err(_) => break,
                    },
                };
                match msg {
                    Control::Poke => {}
                    Control::Shutdown => break,
                }
            });

        let watchdog = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(error = %e, "failed to spawn watchdog thread, timeouts run checkpoint-only");
                None
            }
        };

        ResourceLimiter {
            shared,
            control: tx,
            watchdog: Mutex::new(watchdog),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.watchdog.lock().is_some()
    }

    /// Arms a wall-clock timeout for the calling thread. Replaces any
    /// deadline this thread had armed before.
    pub fn set_execution_timeout(&self, limit: Duration) {
        let tid = thread::current().id();
        let deadline = Instant::now() + limit;
        self.shared.expired.lock().remove(&tid);
        self.shared.deadlines.lock().insert(tid, (deadline, limit));
        let _ = self.control.send(Control::Poke);
        debug!(limit_secs = limit.as_secs_f64(), "execution timeout armed");
    }

    /// Disarms the calling thread's timeout and clears its flag.
    pub fn clear_timeout(&self) {
        let tid = thread::current().id();
        self.shared.deadlines.lock().remove(&tid);
        self.shared.expired.lock().remove(&tid);
        let _ = self.control.send(Control::Poke);
    }

    /// Whether the watchdog has flagged the calling thread.
    pub fn timed_out(&self) -> bool {
        self.shared
            .expired
            .lock()
            .contains_key(&thread::current().id())
    }

    /// Cooperative check called between units of work. Converts a passed
    /// deadline into an error. The direct deadline comparison keeps the
    /// result deterministic even if the watchdog has not woken yet.
    pub fn checkpoint(&self) -> Result<(), RuntimeError> {
        let tid = thread::current().id();
        if let Some(limit) = self.shared.expired.lock().get(&tid).copied() {
            return Err(Self::deadline_error(limit));
        }
        let armed = self.shared.deadlines.lock().get(&tid).copied();
        if let Some((deadline, limit)) = armed {
            if Instant::now() >= deadline {
                return Err(Self::deadline_error(limit));
            }
        }
        Ok(())
    }

    fn deadline_error(limit: Duration) -> RuntimeError {
        RuntimeError::ResourceLimitExceeded {
            resource: "execution_time".to_string(),
            limit: format!("{}s", limit.as_secs_f64()),
            reason: "wall-clock deadline passed".to_string(),
        }
    }

    /// Arms a timeout and returns a guard that disarms it when dropped, on
    /// every exit path including unwinding.
    pub fn scoped_timeout(&self, limit: Duration) -> ScopedTimeout<'_> {
        self.set_execution_timeout(limit);
        ScopedTimeout { limiter: self }
    }

    /// Best-effort address-space ceiling via `setrlimit`. A zero limit is a
    /// no-op. Process-wide on unix, so this constrains the whole runtime,
    /// not just one block, and it is inherited by spawned subprocesses
    /// until [`disable_all`] is called.
    ///
    /// [`disable_all`]: ResourceLimiter::disable_all
    #[cfg(unix)]
    pub fn set_memory_limit_mb(&self, max_memory_mb: u64) -> Result<(), RuntimeError> {
        if max_memory_mb == 0 {
            return Ok(());
        }
        let bytes = max_memory_mb.saturating_mul(1024 * 1024);
        set_rlimit(libc::RLIMIT_AS as u32, bytes).map_err(|errno| {
            RuntimeError::ResourceLimitExceeded {
                resource: "memory".to_string(),
                limit: format!("{}MB", max_memory_mb),
                reason: format!("setrlimit failed with errno {}", errno),
            }
        })
    }

    #[cfg(not(unix))]
    pub fn set_memory_limit_mb(&self, _max_memory_mb: u64) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Best-effort CPU-time ceiling via `setrlimit`. A zero limit is a
    /// no-op.
    #[cfg(unix)]
    pub fn set_cpu_time_limit(&self, max_cpu_seconds: u64) -> Result<(), RuntimeError> {
        if max_cpu_seconds == 0 {
            return Ok(());
        }
        set_rlimit(libc::RLIMIT_CPU as u32, max_cpu_seconds).map_err(|errno| {
            RuntimeError::ResourceLimitExceeded {
                resource: "cpu_time".to_string(),
                limit: format!("{}s", max_cpu_seconds),
                reason: format!("setrlimit failed with errno {}", errno),
            }
        })
    }

    #[cfg(not(unix))]
    pub fn set_cpu_time_limit(&self, _max_cpu_seconds: u64) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Resets the OS ceilings back to unlimited.
    #[cfg(unix)]
    pub fn disable_all(&self) -> Result<(), RuntimeError> {
        for resource in [libc::RLIMIT_AS as u32, libc::RLIMIT_CPU as u32] {
            set_rlimit(resource, libc::RLIM_INFINITY as u64).map_err(|errno| {
                RuntimeError::ResourceLimitExceeded {
                    resource: "os_limits".to_string(),
                    limit: "unlimited".to_string(),
                    reason: format!("setrlimit failed with errno {}", errno),
                }
            })?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn disable_all(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

impl Default for ResourceLimiter {
    fn default() -> Self {
        ResourceLimiter::new()
    }
}

impl Drop for ResourceLimiter {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.watchdog.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Disarms the arming thread's timeout when dropped. Returned by
/// [`ResourceLimiter::scoped_timeout`].
pub struct ScopedTimeout<'a> {
    limiter: &'a ResourceLimiter,
}

impl ScopedTimeout<'_> {
    pub fn checkpoint(&self) -> Result<(), RuntimeError> {
        self.limiter.checkpoint()
    }
}

impl Drop for ScopedTimeout<'_> {
    fn drop(&mut self) {
        self.limiter.clear_timeout();
    }
}

#[cfg(unix)]
fn set_rlimit(resource: u32, value: u64) -> Result<(), i32> {
    let rlim = libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    };
    let rc = unsafe { libc::setrlimit(resource as _, &rlim) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_passes_with_no_deadline() {
        let limiter = ResourceLimiter::new();
        assert!(limiter.checkpoint().is_ok());
    }

    #[test]
    fn test_expired_deadline_fails_the_checkpoint() {
        let limiter = ResourceLimiter::new();
        limiter.set_execution_timeout(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(50));
        let err = limiter.checkpoint().unwrap_err();
        match err {
            RuntimeError::ResourceLimitExceeded { resource, .. } => {
                assert_eq!(resource, "execution_time");
            }
            other => panic!("expected limit error, got {other:?}"),
        }
    }

    #[test]
    fn test_rearming_resets_the_flag() {
        let limiter = ResourceLimiter::new();
        limiter.set_execution_timeout(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(50));
        assert!(limiter.checkpoint().is_err());

        limiter.set_execution_timeout(Duration::from_secs(60));
        assert!(limiter.checkpoint().is_ok());
    }

    #[test]
    fn test_deadlines_are_independent_per_thread() {
        let limiter = Arc::new(ResourceLimiter::new());
        limiter.set_execution_timeout(Duration::from_secs(60));

        let worker_limiter = limiter.clone();
        let worker = thread::spawn(move || {
            worker_limiter.set_execution_timeout(Duration::from_millis(10));
            thread::sleep(Duration::from_millis(50));
            worker_limiter.checkpoint()
        });

        // The worker's short deadline expires without touching this
        // thread's 60s one.
        assert!(worker.join().unwrap().is_err());
        assert!(limiter.checkpoint().is_ok());
        assert!(!limiter.timed_out());
        limiter.clear_timeout();
    }

    #[test]
    fn test_clearing_one_thread_leaves_others_armed() {
        let limiter = Arc::new(ResourceLimiter::new());
        limiter.set_execution_timeout(Duration::from_millis(10));

        let worker_limiter = limiter.clone();
        thread::spawn(move || {
            worker_limiter.set_execution_timeout(Duration::from_secs(60));
            worker_limiter.clear_timeout();
        })
        .join()
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(limiter.checkpoint().is_err());
        limiter.clear_timeout();
    }

    #[test]
    fn test_scoped_guard_disarms_on_normal_exit() {
        let limiter = ResourceLimiter::new();
        {
            let guard = limiter.scoped_timeout(Duration::from_secs(60));
            assert!(guard.checkpoint().is_ok());
        }
        assert!(!limiter.timed_out());
        assert!(limiter.checkpoint().is_ok());
    }

    #[test]
    fn test_scoped_guard_disarms_when_the_body_panics() {
        let limiter = ResourceLimiter::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = limiter.scoped_timeout(Duration::from_millis(10));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(limiter.checkpoint().is_ok());
    }

    #[test]
    fn test_scoped_guard_disarms_after_an_expired_deadline() {
        let limiter = ResourceLimiter::new();
        {
            let guard = limiter.scoped_timeout(Duration::from_millis(10));
            thread::sleep(Duration::from_millis(50));
            assert!(guard.checkpoint().is_err());
        }
        assert!(limiter.checkpoint().is_ok());
    }

    #[test]
    fn test_zero_os_limits_are_no_ops() {
        let limiter = ResourceLimiter::new();
        assert!(limiter.set_memory_limit_mb(0).is_ok());
        assert!(limiter.set_cpu_time_limit(0).is_ok());
    }
}
