use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use super::{Color, Surface, CLOCK_REGION, GLYPH_HEIGHT, GLYPH_WIDTH, TELEMETRY_REGION};
use crate::{
    extrapolate::{current_position, format_position},
    snapshot::{PlaybackState, StatusSnapshot},
    Result,
};

const CADENCE_ORIGIN: (u16, u16) = (0, TELEMETRY_REGION.y);
const CADENCE_SIZE: u8 = 2;
const POSITION_ORIGIN: (u16, u16) = (0, TELEMETRY_REGION.y + 2 * GLYPH_HEIGHT);

/// Owns the shared panel and draws the two status regions.
///
/// Every draw takes the panel lock for exactly its own primitive calls; text is
/// formatted before the lock is taken.
pub struct Renderer<S: Surface> {
    surface: Arc<Mutex<S>>,
}

impl<S: Surface> Clone for Renderer<S> {
    fn clone(&self) -> Self {
        Self {
            surface: Arc::clone(&self.surface),
        }
    }
}

impl<S: Surface> Renderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface: Arc::new(Mutex::new(surface)),
        }
    }

    /// Redraw the clock row as 12-hour `HH:MM:SS`.
    pub fn render_clock<Tz>(&self, now: &DateTime<Tz>) -> Result<()>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let text = format_clock(now);
        let mut panel = self.surface.lock();
        panel.fill_rect(CLOCK_REGION, Color::BLACK)?;
        panel.set_text_size(1)?;
        panel.set_text_color(Color::WHITE)?;
        panel.set_cursor(CLOCK_REGION.x, CLOCK_REGION.y)?;
        panel.print(&text)
    }

    /// Redraw cadence and, unless playback is off, the extrapolated position.
    pub fn render_telemetry(&self, snapshot: &StatusSnapshot, now: DateTime<Utc>) -> Result<()> {
        self.render_telemetry_if(snapshot, now, || true).map(|_| ())
    }

    /// Like [`Self::render_telemetry`], but `allowed` is checked with the panel
    /// already locked; returns whether anything was drawn.
    pub fn render_telemetry_if(
        &self,
        snapshot: &StatusSnapshot,
        now: DateTime<Utc>,
        allowed: impl FnOnce() -> bool,
    ) -> Result<bool> {
        let lines = TelemetryLines::from_snapshot(snapshot, now);
        let mut panel = self.surface.lock();
        if !allowed() {
            return Ok(false);
        }
        panel.fill_rect(TELEMETRY_REGION, Color::BLACK)?;
        let Some(lines) = lines else {
            return Ok(true);
        };

        panel.set_text_size(CADENCE_SIZE)?;
        panel.set_text_color(Color::GREEN)?;
        panel.set_cursor(CADENCE_ORIGIN.0, CADENCE_ORIGIN.1)?;
        panel.print(&lines.cadence)?;
        panel.set_text_size(1)?;
        panel.set_text_color(Color::WHITE)?;
        panel.set_cursor(
            CADENCE_ORIGIN.0 + 3 * GLYPH_WIDTH * CADENCE_SIZE as u16 + 2,
            CADENCE_ORIGIN.1 + GLYPH_HEIGHT,
        )?;
        panel.print("RPM")?;

        if let Some(position) = lines.position.as_deref() {
            panel.set_text_color(Color::BLUE)?;
            panel.set_cursor(POSITION_ORIGIN.0, POSITION_ORIGIN.1)?;
            panel.print(position)?;
        }
        Ok(true)
    }

    pub fn render_reconnecting(&self) -> Result<()> {
        let mut panel = self.surface.lock();
        panel.clear()?;
        panel.set_text_size(1)?;
        panel.set_text_color(Color::RED)?;
        panel.set_cursor(0, 0)?;
        panel.print("NO WIFI")?;
        panel.set_cursor(0, GLYPH_HEIGHT)?;
        panel.print("retrying...")
    }

    pub fn render_shutdown(&self) -> Result<()> {
        let mut panel = self.surface.lock();
        panel.clear()?;
        panel.set_text_size(1)?;
        panel.set_text_color(Color::WHITE)?;
        panel.set_cursor(0, 0)?;
        panel.print("offline")
    }

    /// Blank the telemetry region, leaving the clock row alone.
    pub fn clear_telemetry(&self) -> Result<()> {
        self.surface.lock().fill_rect(TELEMETRY_REGION, Color::BLACK)
    }

    pub fn clear(&self) -> Result<()> {
        self.surface.lock().clear()
    }

    /// Run `f` with the panel locked, e.g. to inspect a [`super::MemoryPanel`].
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.surface.lock())
    }
}

pub fn format_clock<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    now.format("%I:%M:%S").to_string()
}

/// Text for the telemetry region; `None` means leave it blank.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TelemetryLines {
    cadence: String,
    position: Option<String>,
}

impl TelemetryLines {
    fn from_snapshot(snapshot: &StatusSnapshot, now: DateTime<Utc>) -> Option<Self> {
        if snapshot.telemetry_blank() {
            return None;
        }
        let position = match snapshot.playback_state {
            PlaybackState::Off => None,
            _ => Some(format_position(current_position(snapshot, now))),
        };
        Some(Self {
            cadence: format!("{}", snapshot.cadence.round() as i64),
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{MemoryPanel, PanelOp, Rect};
    use chrono::Duration;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, h, m, s).unwrap()
    }

    fn telemetry_text(renderer: &Renderer<MemoryPanel>) -> Vec<String> {
        renderer.with_surface(|p| p.text_in(TELEMETRY_REGION))
    }

    #[test]
    fn clock_uses_twelve_hour_format() {
        assert_eq!(format_clock(&at(0, 5, 9)), "12:05:09");
        assert_eq!(format_clock(&at(13, 45, 0)), "01:45:00");
        assert_eq!(format_clock(&at(11, 59, 59)), "11:59:59");
    }

    #[test]
    fn render_clock_is_idempotent() {
        let renderer = Renderer::new(MemoryPanel::default());
        let now = at(18, 30, 5);
        renderer.render_clock(&now).unwrap();
        let once = renderer.with_surface(|p| p.text_in(CLOCK_REGION));
        renderer.render_clock(&now).unwrap();
        let twice = renderer.with_surface(|p| p.text_in(CLOCK_REGION));
        assert_eq!(once, vec!["06:30:05"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn clock_does_not_touch_telemetry() {
        let renderer = Renderer::new(MemoryPanel::default());
        let snap = StatusSnapshot {
            cadence: 82.4,
            ..StatusSnapshot::default()
        };
        renderer.render_telemetry(&snap, at(9, 0, 0)).unwrap();
        renderer.render_clock(&at(9, 0, 1)).unwrap();
        assert_eq!(telemetry_text(&renderer), vec!["82", "RPM"]);
    }

    #[test]
    fn telemetry_rounds_cadence_and_omits_position_when_off() {
        let renderer = Renderer::new(MemoryPanel::default());
        let snap = StatusSnapshot {
            cadence: 79.5,
            ..StatusSnapshot::default()
        };
        renderer.render_telemetry(&snap, at(9, 0, 0)).unwrap();
        assert_eq!(telemetry_text(&renderer), vec!["80", "RPM"]);
    }

    #[test]
    fn telemetry_shows_extrapolated_position_while_playing() {
        let renderer = Renderer::new(MemoryPanel::default());
        let observed = at(9, 0, 0);
        let snap = StatusSnapshot {
            cadence: 0.0,
            playback_state: PlaybackState::Playing,
            playback_position: 58,
            position_observed_at: Some(observed),
            ..StatusSnapshot::default()
        };
        renderer
            .render_telemetry(&snap, observed + Duration::seconds(67))
            .unwrap();
        assert_eq!(telemetry_text(&renderer), vec!["0", "RPM", "02:05"]);
    }

    #[test]
    fn blank_snapshot_clears_region() {
        let renderer = Renderer::new(MemoryPanel::default());
        let busy = StatusSnapshot {
            cadence: 90.0,
            playback_state: PlaybackState::Paused,
            playback_position: 10,
            ..StatusSnapshot::default()
        };
        renderer.render_telemetry(&busy, at(9, 0, 0)).unwrap();
        assert_eq!(telemetry_text(&renderer).len(), 3);

        renderer
            .render_telemetry(&StatusSnapshot::default(), at(9, 0, 5))
            .unwrap();
        assert!(telemetry_text(&renderer).is_empty());
        let ops = renderer.with_surface(|p| p.take_ops());
        assert_eq!(ops.last(), Some(&PanelOp::Fill(TELEMETRY_REGION)));
    }

    #[test]
    fn every_draw_clears_its_own_region_first() {
        let renderer = Renderer::new(MemoryPanel::default());
        renderer.render_clock(&at(1, 2, 3)).unwrap();
        renderer
            .render_telemetry(
                &StatusSnapshot {
                    cadence: 60.0,
                    ..StatusSnapshot::default()
                },
                at(1, 2, 3),
            )
            .unwrap();
        let ops = renderer.with_surface(|p| p.take_ops());
        assert_eq!(ops[0], PanelOp::Fill(CLOCK_REGION));
        let telemetry_start = ops
            .iter()
            .position(|op| op == &PanelOp::Fill(TELEMETRY_REGION))
            .unwrap();
        assert!(ops[1..telemetry_start]
            .iter()
            .all(|op| matches!(op, PanelOp::Text { y, .. } if CLOCK_REGION.contains(0, *y))));
    }

    #[test]
    fn gated_telemetry_skips_when_not_allowed() {
        let renderer = Renderer::new(MemoryPanel::default());
        let snap = StatusSnapshot {
            cadence: 70.0,
            ..StatusSnapshot::default()
        };
        assert!(!renderer
            .render_telemetry_if(&snap, at(9, 0, 0), || false)
            .unwrap());
        assert!(renderer.with_surface(|p| p.ops().is_empty()));
        assert!(renderer
            .render_telemetry_if(&snap, at(9, 0, 0), || true)
            .unwrap());
        assert_eq!(telemetry_text(&renderer), vec!["70", "RPM"]);
    }

    #[test]
    fn zero_cadence_with_distance_still_draws() {
        let renderer = Renderer::new(MemoryPanel::default());
        let snap = StatusSnapshot {
            cadence: 0.0,
            distance: 12.4,
            ..StatusSnapshot::default()
        };
        renderer.render_telemetry(&snap, at(9, 0, 0)).unwrap();
        assert_eq!(telemetry_text(&renderer), vec!["0", "RPM"]);
    }

    #[test]
    fn clear_telemetry_keeps_clock() {
        let renderer = Renderer::new(MemoryPanel::default());
        renderer.render_clock(&at(9, 0, 0)).unwrap();
        renderer
            .render_telemetry(
                &StatusSnapshot {
                    cadence: 88.0,
                    ..StatusSnapshot::default()
                },
                at(9, 0, 0),
            )
            .unwrap();
        renderer.clear_telemetry().unwrap();
        assert!(telemetry_text(&renderer).is_empty());
        assert_eq!(
            renderer.with_surface(|p| p.text_in(CLOCK_REGION)),
            vec!["09:00:00"]
        );
    }

    #[test]
    fn overlays_replace_whole_panel() {
        let renderer = Renderer::new(MemoryPanel::default());
        renderer.render_clock(&at(1, 2, 3)).unwrap();
        renderer.render_reconnecting().unwrap();
        let all = renderer.with_surface(|p| p.text_in(Rect::new(0, 0, 64, 32)));
        assert_eq!(all, vec!["NO WIFI", "retrying..."]);
        renderer.render_shutdown().unwrap();
        let all = renderer.with_surface(|p| p.text_in(Rect::new(0, 0, 64, 32)));
        assert_eq!(all, vec!["offline"]);
    }
}
