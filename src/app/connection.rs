use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::Result;

/// Network link as seen from the render loop.
///
/// Joining the network is the implementor's job; the loop only detects loss and
/// asks for a reconnect.
pub trait Connectivity: Send {
    fn is_connected(&mut self) -> bool;
    fn reconnect(&mut self) -> Result<()>;
}

/// Link that never drops, for hosts where the OS manages networking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&mut self) -> bool {
        true
    }

    fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Link whose `is_connected` answers are scripted; once the script runs dry the
/// last answer repeats. Clones share the script and reconnect counter.
#[derive(Clone)]
pub struct ScriptedConnectivity {
    script: Arc<Mutex<VecDeque<bool>>>,
    last: Arc<AtomicBool>,
    reconnects: Arc<AtomicUsize>,
}

impl ScriptedConnectivity {
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(AtomicBool::new(true)),
            reconnects: Arc::default(),
        }
    }

    pub fn reconnect_calls(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }
}

impl Connectivity for ScriptedConnectivity {
    fn is_connected(&mut self) -> bool {
        if let Some(next) = self.script.lock().pop_front() {
            self.last.store(next, Ordering::SeqCst);
        }
        self.last.load(Ordering::SeqCst)
    }

    fn reconnect(&mut self) -> Result<()> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Reconnecting,
}

/// Shared "telemetry may be drawn" flag; cleared while the link is down.
#[derive(Debug, Clone)]
pub struct LinkFlag(Arc<AtomicBool>);

impl Default for LinkFlag {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl LinkFlag {
    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

/// Exponential pacing for reconnect attempts.
#[derive(Debug, Clone)]
pub struct BackoffController {
    initial: Duration,
    max: Duration,
    current: Duration,
    next_attempt: Option<Instant>,
    failures: u32,
}

impl BackoffController {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial = Duration::from_millis(initial_ms.max(1));
        let max = Duration::from_millis(max_ms.max(initial_ms).max(1));
        Self {
            initial,
            max,
            current: initial,
            next_attempt: None,
            failures: 0,
        }
    }

    pub fn should_retry(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    pub fn mark_failure(&mut self, now: Instant) {
        if self.failures > 0 {
            self.current = (self.current * 2).min(self.max);
        }
        self.failures = self.failures.saturating_add(1);
        self.next_attempt = Some(now + self.current);
    }

    pub fn mark_success(&mut self) {
        self.current = self.initial;
        self.next_attempt = None;
        self.failures = 0;
    }

    pub fn current_delay(&self) -> Duration {
        self.current
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
