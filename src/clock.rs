use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Paces a loop. `tick` blocks until the next tick is due and returns `false`
/// once the loop should stop.
pub trait Ticker: Send {
    fn tick(&mut self) -> bool;
}

/// Fixed-interval ticker; the first tick fires immediately.
pub struct IntervalTicker {
    interval: Duration,
    next: Option<Instant>,
    running: Arc<AtomicBool>,
}

impl IntervalTicker {
    pub fn new(interval: Duration, running: Arc<AtomicBool>) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            next: None,
            running,
        }
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        match self.next {
            None => {
                self.next = Some(now + self.interval);
            }
            Some(deadline) if deadline > now => {
                thread::sleep(deadline - now);
                self.next = Some(deadline + self.interval);
            }
            // Running late: skip the backlog instead of bursting.
            Some(_) => {
                self.next = Some(now + self.interval);
            }
        }
        self.running.load(Ordering::SeqCst)
    }
}

/// Yields `n` ticks without sleeping, then stops.
#[derive(Debug, Clone)]
pub struct CountedTicker {
    remaining: u64,
}

impl CountedTicker {
    pub fn new(ticks: u64) -> Self {
        Self { remaining: ticks }
    }
}

impl Ticker for CountedTicker {
    fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Interval ticker capped at `limit` ticks when one is given.
pub struct LimitedTicker<T: Ticker> {
    inner: T,
    limit: Option<CountedTicker>,
}

impl<T: Ticker> LimitedTicker<T> {
    pub fn new(inner: T, limit: Option<u64>) -> Self {
        Self {
            inner,
            limit: limit.map(CountedTicker::new),
        }
    }
}

impl<T: Ticker> Ticker for LimitedTicker<T> {
    fn tick(&mut self) -> bool {
        if let Some(limit) = self.limit.as_mut() {
            if !limit.tick() {
                return false;
            }
        }
        self.inner.tick()
    }
}
