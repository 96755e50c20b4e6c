use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Media-player state as reported by the `mp_state` feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Off,
    Playing,
    Paused,
    Idle,
}

impl PlaybackState {
    /// Map a raw feed value; anything unrecognised reads as `Off`.
    pub fn from_feed(raw: &str) -> Self {
        match raw {
            "playing" => PlaybackState::Playing,
            "paused" => PlaybackState::Paused,
            "idle" => PlaybackState::Idle,
            _ => PlaybackState::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Off => "off",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Idle => "idle",
        }
    }
}

/// Last-known telemetry and playback values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    pub cadence: f64,
    pub speed: f64,
    pub distance: f64,
    pub playback_state: PlaybackState,
    pub playback_position: i64,
    /// Wall-clock instant the feed reported `playback_position`.
    pub position_observed_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// True when there is nothing worth drawing in the telemetry region.
    pub fn telemetry_blank(&self) -> bool {
        self.cadence == 0.0 && self.distance == 0.0 && self.playback_state == PlaybackState::Off
    }
}

struct CellInner {
    current: RwLock<Arc<StatusSnapshot>>,
    generation: AtomicU64,
}

/// Shared handle to the single published snapshot.
///
/// Writers replace the whole value, so readers never see a half-decoded poll.
#[derive(Clone)]
pub struct SnapshotCell {
    inner: Arc<CellInner>,
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(StatusSnapshot::default())
    }
}

impl SnapshotCell {
    pub fn new(initial: StatusSnapshot) -> Self {
        Self {
            inner: Arc::new(CellInner {
                current: RwLock::new(Arc::new(initial)),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn load(&self) -> Arc<StatusSnapshot> {
        Arc::clone(&self.inner.current.read())
    }

    /// Replace the published snapshot and return the new generation.
    pub fn publish(&self, snapshot: StatusSnapshot) -> u64 {
        let next = Arc::new(snapshot);
        *self.inner.current.write() = next;
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of publishes so far; zero until the first poll lands.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}
