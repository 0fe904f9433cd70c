//! Common test utilities for integration tests.
//!
//! Provides `ScriptedApplier`, an in-memory platform with failure injection
//! and a gate for holding mutations mid-batch, plus helpers for running
//! Linux tests inside a private network namespace.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use osrouter::{ApplyError, ApplyResult, Mutation, NetworkConfig, PlatformApplier};
use tokio::sync::Semaphore;

/// In-memory applier driven by the test.
///
/// Every call is logged on entry. When gated, each call then waits for a
/// permit released with [`ScriptedApplier::open_gate`].
#[derive(Default)]
pub struct ScriptedApplier {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, VecDeque<ApplyError>>>,
    gate: Option<Semaphore>,
}

impl ScriptedApplier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create an applier whose calls block until the gate opens.
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        })
    }

    /// Let `n` more calls through.
    pub fn open_gate(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Fail the next call for `mutation` (matched by its display form).
    pub fn fail(&self, mutation: &str, error: ApplyError) {
        self.failures
            .lock()
            .unwrap()
            .entry(mutation.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls.lock().unwrap().len() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("applier was never called");
    }
}

#[async_trait]
impl PlatformApplier for ScriptedApplier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn apply(&self, mutation: &Mutation) -> ApplyResult {
        let key = mutation.to_string();
        self.calls.lock().unwrap().push(key.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// An address on wg0 plus one route to `route`.
pub fn tunnel(route: &str) -> NetworkConfig {
    NetworkConfig::new()
        .address("wg0", "100.64.0.1/32")
        .unwrap()
        .route(route, |r| r.dev("wg0"))
        .unwrap()
}

/// Check if running as root.
#[allow(dead_code)]
pub fn is_root() -> bool {
    #[cfg(target_os = "linux")]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Run `test` on a fresh thread inside a private network namespace.
///
/// Commands spawned from the test inherit the namespace.
#[cfg(target_os = "linux")]
#[allow(dead_code)]
pub fn in_netns<F, Fut>(test: F)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()>,
{
    let handle = std::thread::spawn(move || {
        // SAFETY: unshare only affects the calling thread's namespaces.
        let ret = unsafe { libc::unshare(libc::CLONE_NEWNET) };
        assert_eq!(
            ret,
            0,
            "unshare(CLONE_NEWNET) failed: {}",
            std::io::Error::last_os_error()
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(test());
    });
    if let Err(panic) = handle.join() {
        std::panic::resume_unwind(panic);
    }
}

/// Run an `ip` command in the current namespace and return its stdout.
#[allow(dead_code)]
pub fn ip(args: &[&str]) -> String {
    let output = std::process::Command::new("ip")
        .args(args)
        .output()
        .expect("failed to run ip");
    assert!(
        output.status.success(),
        "ip {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Skip the test if not running as root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return;
        }
    };
}
