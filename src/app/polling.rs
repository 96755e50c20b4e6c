use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::connection::LinkFlag;
use super::Logger;
use crate::{
    clock::{Clock, Ticker},
    display::{Renderer, Surface},
    query::{combined_query, decode_rows, retry, DecodeError, QueryError, RemoteStateClient},
    snapshot::{SnapshotCell, StatusSnapshot},
    Error, Result,
};

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub snapshot: StatusSnapshot,
    /// Set when every attempt failed; the snapshot then carries reset ride metrics.
    pub query_error: Option<QueryError>,
    pub decode_errors: Vec<DecodeError>,
}

/// Query + retry + decode, with no knowledge of threads or the panel.
pub struct Poller<C: RemoteStateClient> {
    client: C,
    query_text: String,
    attempts: u32,
    logger: Arc<Logger>,
}

impl<C: RemoteStateClient> Poller<C> {
    pub fn new(client: C, bucket: &str, attempts: u32, logger: Arc<Logger>) -> Self {
        Self {
            client,
            query_text: combined_query(bucket),
            attempts: attempts.max(1),
            logger,
        }
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn poll_once(&mut self, prior: &StatusSnapshot) -> PollReport {
        let attempts = self.attempts;
        let client = &mut self.client;
        let query_text = self.query_text.as_str();
        let logger = &self.logger;
        let result = retry(attempts, |attempt| {
            client.query(query_text).inspect_err(|err| {
                logger.warn(format!(
                    "query attempt {}/{attempts} failed: {err}",
                    attempt + 1
                ));
            })
        });

        let (rows, query_error) = match result {
            Ok(rows) => (rows, None),
            Err(err) => {
                self.logger
                    .warn(format!("poll gave up after {attempts} attempts: {err}"));
                (Vec::new(), Some(err))
            }
        };

        let decoded = decode_rows(prior, &rows);
        for err in &decoded.errors {
            self.logger.debug(format!("decode: {err}"));
        }
        for tag in &decoded.unknown_tags {
            self.logger.debug(format!("decode: ignoring unknown tag '{tag}'"));
        }
        let snap = &decoded.snapshot;
        self.logger.debug(format!(
            "snapshot cadence={:.1} speed={:.1} distance={:.2} state={} pos={}",
            snap.cadence,
            snap.speed,
            snap.distance,
            snap.playback_state.as_str(),
            snap.playback_position
        ));

        PollReport {
            snapshot: decoded.snapshot,
            query_error,
            decode_errors: decoded.errors,
        }
    }
}

/// Everything the poller thread owns.
pub struct PollContext<C: RemoteStateClient, S: Surface, T: Ticker> {
    pub poller: Poller<C>,
    pub cell: SnapshotCell,
    pub renderer: Renderer<S>,
    pub clock: Arc<dyn Clock>,
    pub link: LinkFlag,
    pub ticker: T,
    pub poll_every_ticks: u32,
    pub logger: Arc<Logger>,
}

impl<C: RemoteStateClient, S: Surface, T: Ticker> PollContext<C, S, T> {
    /// One poll cycle: query, publish, and draw telemetry if the link is up.
    ///
    /// The panel lock is only taken after the query has returned, and the link is
    /// checked under it so a reconnect overlay is never painted over.
    pub fn run_cycle(&mut self) -> PollReport {
        let prior = self.cell.load();
        let report = self.poller.poll_once(&prior);
        self.cell.publish(report.snapshot.clone());
        let link = &self.link;
        if let Err(err) =
            self.renderer
                .render_telemetry_if(&report.snapshot, self.clock.now(), || link.is_online())
        {
            self.logger.warn(format!("telemetry draw failed: {err}"));
        }
        report
    }

    /// Tick until the ticker or `running` says stop, polling on tick 0 and every
    /// `poll_every_ticks` after that.
    pub fn run(&mut self, running: &AtomicBool) {
        let every = u64::from(self.poll_every_ticks.max(1));
        let mut tick: u64 = 0;
        let mut cycles: u64 = 0;
        while running.load(Ordering::SeqCst) && self.ticker.tick() {
            if tick % every == 0 {
                let report = self.run_cycle();
                cycles += 1;
                self.logger.trace(format!(
                    "poll cycle {cycles} at tick {tick}: generation {}, {} decode error(s)",
                    self.cell.generation(),
                    report.decode_errors.len()
                ));
            }
            tick = tick.wrapping_add(1);
        }
    }
}

/// Liveness of the poller thread, shared with the render loop.
///
/// Cleared when the thread exits for any reason, a panic included.
#[derive(Debug, Clone)]
pub struct PollerHealth(Arc<AtomicBool>);

impl Default for PollerHealth {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl PollerHealth {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn mark_stopped(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Lives on the poller thread's stack; dropping it (also while unwinding)
/// marks the poller stopped.
struct ExitGuard(PollerHealth);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

/// Guard for the poller thread; stops it on drop.
pub struct PollingHandle {
    running: Arc<AtomicBool>,
    health: PollerHealth,
    thread: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn health(&self) -> PollerHealth {
        self.health.clone()
    }

    /// Wait for the thread to exit. Call `stop` first unless the ticker is finite.
    pub fn join(mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread
            .join()
            .map_err(|_| Error::Io(io::Error::other("poller thread panicked")))
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Spawn the background poller.
pub fn start_polling<C, S, T>(mut ctx: PollContext<C, S, T>) -> Result<PollingHandle>
where
    C: RemoteStateClient + 'static,
    S: Surface + 'static,
    T: Ticker + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    let health = PollerHealth::default();
    let guard = ExitGuard(health.clone());
    let thread = thread::Builder::new()
        .name("pedalpanel-poller".into())
        .spawn(move || {
            let _guard = guard;
            ctx.run(&running_clone);
        })?;
    Ok(PollingHandle {
        running,
        health,
        thread: Some(thread),
    })
}
