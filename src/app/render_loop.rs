use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;

use super::connection::{BackoffController, Connectivity, LinkFlag, LinkState};
use super::polling::PollerHealth;
use super::Logger;
use crate::{
    clock::{Clock, Ticker},
    display::{Renderer, Surface},
    snapshot::{PlaybackState, SnapshotCell},
    Result,
};

/// State owned by the foreground loop.
pub struct RenderContext<S: Surface, K: Connectivity, T: Ticker> {
    pub renderer: Renderer<S>,
    pub cell: SnapshotCell,
    pub connectivity: K,
    pub clock: Arc<dyn Clock>,
    pub ticker: T,
    pub link: LinkFlag,
    pub backoff: BackoffController,
    /// Liveness of the background poller, when one feeds `cell`.
    pub poller: Option<PollerHealth>,
    pub logger: Arc<Logger>,
}

/// Counters returned when the loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub ticks: u64,
    pub clock_draws: u64,
    pub link_losses: u64,
    pub reconnect_attempts: u64,
    /// Playback refreshes drawn between polls.
    pub telemetry_draws: u64,
    /// The poller stopped while the loop was still running.
    pub poller_lost: bool,
}

/// Drive the clock and connectivity state machine until `running` clears or the
/// ticker stops, then leave the shutdown message on the panel.
pub fn run_render_loop<S, K, T>(
    ctx: &mut RenderContext<S, K, T>,
    running: &AtomicBool,
) -> Result<RenderStats>
where
    S: Surface,
    K: Connectivity,
    T: Ticker,
{
    let mut state = LinkState::Connected;
    let mut stats = RenderStats::default();
    ctx.link.set(true);

    while running.load(Ordering::SeqCst) && ctx.ticker.tick() {
        stats.ticks += 1;
        // A poller that exited after `running` cleared is just shutting down.
        let poller_dead = ctx.poller.as_ref().is_some_and(|h| !h.is_alive());
        if !stats.poller_lost && poller_dead && running.load(Ordering::SeqCst) {
            stats.poller_lost = true;
            drop_stale_telemetry(ctx);
        }
        let connected = ctx.connectivity.is_connected();
        state = match (state, connected) {
            (LinkState::Connected, true) => {
                draw_clock(ctx, &mut stats);
                if !stats.poller_lost {
                    refresh_playback(ctx, &mut stats);
                }
                LinkState::Connected
            }
            (LinkState::Connected, false) => {
                stats.link_losses += 1;
                ctx.logger.warn("network link lost; pausing display");
                // Flag first: the poller checks it under the panel lock.
                ctx.link.set(false);
                if let Err(err) = ctx.renderer.render_reconnecting() {
                    ctx.logger.warn(format!("reconnect overlay failed: {err}"));
                }
                try_reconnect(ctx, &mut stats);
                LinkState::Reconnecting
            }
            (LinkState::Reconnecting, false) => {
                try_reconnect(ctx, &mut stats);
                LinkState::Reconnecting
            }
            (LinkState::Reconnecting, true) => {
                ctx.logger.info(format!(
                    "network link restored after {} attempt(s)",
                    ctx.backoff.failures()
                ));
                ctx.backoff.mark_success();
                restore(ctx, !stats.poller_lost);
                draw_clock(ctx, &mut stats);
                LinkState::Connected
            }
        };
    }

    ctx.link.set(false);
    ctx.renderer.render_shutdown()?;
    Ok(stats)
}

fn draw_clock<S: Surface, K: Connectivity, T: Ticker>(
    ctx: &RenderContext<S, K, T>,
    stats: &mut RenderStats,
) {
    let now = ctx.clock.now().with_timezone(&Local);
    match ctx.renderer.render_clock(&now) {
        Ok(()) => stats.clock_draws += 1,
        Err(err) => ctx.logger.warn(format!("clock draw failed: {err}")),
    }
}

/// Redraw the telemetry block from the last snapshot so a playing track's
/// position keeps moving between polls.
fn refresh_playback<S: Surface, K: Connectivity, T: Ticker>(
    ctx: &RenderContext<S, K, T>,
    stats: &mut RenderStats,
) {
    let snapshot = ctx.cell.load();
    if snapshot.playback_state == PlaybackState::Off {
        return;
    }
    let link = &ctx.link;
    match ctx
        .renderer
        .render_telemetry_if(&snapshot, ctx.clock.now(), || link.is_online())
    {
        Ok(true) => stats.telemetry_draws += 1,
        Ok(false) => {}
        Err(err) => ctx.logger.warn(format!("playback refresh failed: {err}")),
    }
}

fn drop_stale_telemetry<S: Surface, K: Connectivity, T: Ticker>(ctx: &RenderContext<S, K, T>) {
    ctx.logger
        .error("poller thread stopped; clearing telemetry, it will not update again");
    if !ctx.link.is_online() {
        return;
    }
    if let Err(err) = ctx.renderer.clear_telemetry() {
        ctx.logger.warn(format!("telemetry clear failed: {err}"));
    }
}

fn try_reconnect<S: Surface, K: Connectivity, T: Ticker>(
    ctx: &mut RenderContext<S, K, T>,
    stats: &mut RenderStats,
) {
    let now = Instant::now();
    if !ctx.backoff.should_retry(now) {
        return;
    }
    stats.reconnect_attempts += 1;
    if let Err(err) = ctx.connectivity.reconnect() {
        ctx.logger.warn(format!("reconnect failed: {err}"));
    }
    ctx.backoff.mark_failure(now);
    ctx.logger.debug(format!(
        "next reconnect attempt in {}",
        humantime::format_duration(ctx.backoff.current_delay())
    ));
}

/// Bring the panel back from the overlay, redrawing telemetry from the last
/// published snapshot when it is still being fed.
fn restore<S: Surface, K: Connectivity, T: Ticker>(
    ctx: &RenderContext<S, K, T>,
    with_telemetry: bool,
) {
    ctx.link.set(true);
    let snapshot = ctx.cell.load();
    let redraw = ctx.renderer.clear().and_then(|_| {
        if with_telemetry {
            ctx.renderer.render_telemetry(&snapshot, ctx.clock.now())
        } else {
            Ok(())
        }
    });
    if let Err(err) = redraw {
        ctx.logger.warn(format!("redraw after reconnect failed: {err}"));
    }
}
