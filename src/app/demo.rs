use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{
    clock::Clock,
    query::{
        QueryError, RemoteStateClient, Row, TAG_CADENCE, TAG_DISTANCE, TAG_MP_POS, TAG_MP_STATE,
        TAG_SPEED,
    },
};

const TRACK_SECS: i64 = 215;
const BASE_CADENCE: f64 = 82.0;
const CADENCE_SWING: f64 = 9.0;
const KMH_PER_RPM: f64 = 0.31;

/// Offline stand-in for the time-series database.
///
/// Answers every query with a synthetic ride and a media player that plays a
/// fixed-length track on repeat, pausing every third time through.
pub struct DemoClient {
    clock: Arc<dyn Clock>,
    started: DateTime<Utc>,
    distance_km: f64,
    last_query: Option<DateTime<Utc>>,
}

impl DemoClient {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            distance_km: 0.0,
            last_query: None,
        }
    }

    fn rows_at(&mut self, now: DateTime<Utc>) -> Vec<Row> {
        let elapsed = (now - self.started).num_milliseconds().max(0) as f64 / 1000.0;
        let cadence = BASE_CADENCE + CADENCE_SWING * (elapsed / 20.0).sin();
        let speed = cadence * KMH_PER_RPM;
        if let Some(prev) = self.last_query {
            let hours = (now - prev).num_milliseconds().max(0) as f64 / 3_600_000.0;
            self.distance_km += speed * hours;
        }
        self.last_query = Some(now);

        let whole = elapsed as i64;
        let lap = whole / TRACK_SECS;
        let state = if lap % 3 == 2 { "paused" } else { "playing" };
        let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        vec![
            Row::number(TAG_CADENCE, cadence),
            Row::number(TAG_SPEED, speed),
            Row::number(TAG_DISTANCE, self.distance_km),
            Row::text(TAG_MP_STATE, state).at(&stamp),
            Row::number(TAG_MP_POS, (whole % TRACK_SECS) as f64).at(&stamp),
        ]
    }
}

impl RemoteStateClient for DemoClient {
    fn query(&mut self, _text: &str) -> Result<Vec<Row>, QueryError> {
        let now = self.clock.now();
        Ok(self.rows_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::query::decode_rows;
    use crate::snapshot::{PlaybackState, StatusSnapshot};
    use chrono::{Duration, TimeZone};

    fn demo() -> (DemoClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 4, 9, 0, 0).unwrap(),
        ));
        (DemoClient::new(clock.clone()), clock)
    }

    #[test]
    fn rows_decode_cleanly() {
        let (mut client, clock) = demo();
        clock.advance(Duration::seconds(30));
        let rows = client.query("ignored").unwrap();
        let decoded = decode_rows(&StatusSnapshot::default(), &rows);
        assert!(decoded.errors.is_empty());
        assert!(decoded.unknown_tags.is_empty());
        assert_eq!(decoded.snapshot.playback_state, PlaybackState::Playing);
        assert_eq!(decoded.snapshot.playback_position, 30);
        assert_eq!(decoded.snapshot.position_observed_at, Some(clock.now()));
        assert!(decoded.snapshot.cadence > 70.0);
    }

    #[test]
    fn distance_accumulates_between_queries() {
        let (mut client, clock) = demo();
        client.query("q").unwrap();
        clock.advance(Duration::minutes(30));
        let rows = client.query("q").unwrap();
        let snap = decode_rows(&StatusSnapshot::default(), &rows).snapshot;
        assert!(snap.distance > 5.0, "distance {}", snap.distance);
    }

    #[test]
    fn third_lap_is_paused() {
        let (mut client, clock) = demo();
        clock.advance(Duration::seconds(TRACK_SECS * 2 + 5));
        let rows = client.query("q").unwrap();
        let snap = decode_rows(&StatusSnapshot::default(), &rows).snapshot;
        assert_eq!(snap.playback_state, PlaybackState::Paused);
        assert_eq!(snap.playback_position, 5);
    }
}
