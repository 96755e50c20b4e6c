use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::{Row, RowValue, TAG_CADENCE, TAG_DISTANCE, TAG_MP_POS, TAG_MP_STATE, TAG_SPEED};
use crate::snapshot::{PlaybackState, StatusSnapshot};

/// Longest track position accepted from the feed (about 31 years).
pub const MAX_POSITION_SECS: f64 = 1_000_000_000.0;

/// A row that was present but could not be used; the metric reads as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub tag: String,
    pub reason: String,
}

impl DecodeError {
    fn new(tag: &str, reason: impl Into<String>) -> Self {
        Self {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.reason)
    }
}

impl std::error::Error for DecodeError {}

/// Result of one decode pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub snapshot: StatusSnapshot,
    pub errors: Vec<DecodeError>,
    pub unknown_tags: Vec<String>,
}

/// Fold `rows` over `prior`.
///
/// Ride metrics start each pass at zero; playback fields carry over unless a usable
/// row replaces them.
pub fn decode_rows(prior: &StatusSnapshot, rows: &[Row]) -> Decoded {
    let mut snapshot = StatusSnapshot {
        cadence: 0.0,
        speed: 0.0,
        distance: 0.0,
        ..prior.clone()
    };
    let mut errors = Vec::new();
    let mut unknown_tags = Vec::new();

    for row in rows {
        let applied = match row.tag.as_str() {
            TAG_CADENCE => numeric(row).map(|v| snapshot.cadence = v),
            TAG_SPEED => numeric(row).map(|v| snapshot.speed = v),
            TAG_DISTANCE => numeric(row).map(|v| snapshot.distance = v),
            TAG_MP_STATE => playback_state(row).map(|s| snapshot.playback_state = s),
            TAG_MP_POS => playback_position(row).map(|(pos, at)| {
                snapshot.playback_position = pos;
                snapshot.position_observed_at = Some(at);
            }),
            other => {
                unknown_tags.push(other.to_string());
                Ok(())
            }
        };
        if let Err(err) = applied {
            errors.push(err);
        }
    }

    Decoded {
        snapshot,
        errors,
        unknown_tags,
    }
}

fn numeric(row: &Row) -> Result<f64, DecodeError> {
    let value = match &row.value {
        RowValue::Number(v) => *v,
        RowValue::Text(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| DecodeError::new(&row.tag, format!("non-numeric value '{raw}'")))?,
    };
    if !value.is_finite() {
        return Err(DecodeError::new(&row.tag, "value is not finite"));
    }
    if value < 0.0 {
        return Err(DecodeError::new(&row.tag, format!("negative value {value}")));
    }
    Ok(value)
}

fn playback_state(row: &Row) -> Result<PlaybackState, DecodeError> {
    match &row.value {
        RowValue::Text(raw) => Ok(PlaybackState::from_feed(raw)),
        RowValue::Number(v) => Err(DecodeError::new(
            &row.tag,
            format!("expected a state name, got {v}"),
        )),
    }
}

fn playback_position(row: &Row) -> Result<(i64, DateTime<Utc>), DecodeError> {
    let value = numeric(row)?;
    if value > MAX_POSITION_SECS {
        return Err(DecodeError::new(
            &row.tag,
            format!("position {value} exceeds {MAX_POSITION_SECS} s"),
        ));
    }
    let raw_time = row
        .time
        .as_deref()
        .ok_or_else(|| DecodeError::new(&row.tag, "missing _time"))?;
    let at = parse_utc(raw_time)
        .ok_or_else(|| DecodeError::new(&row.tag, format!("unparseable _time '{raw_time}'")))?;
    Ok((value.trunc() as i64, at))
}

/// RFC 3339 with its offset honoured, or an offset-less timestamp taken as UTC.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn playing_prior() -> StatusSnapshot {
        StatusSnapshot {
            cadence: 88.0,
            speed: 31.0,
            distance: 12.5,
            playback_state: PlaybackState::Playing,
            playback_position: 40,
            position_observed_at: Some(Utc.with_ymd_and_hms(2024, 5, 4, 18, 0, 0).unwrap()),
        }
    }

    #[test]
    fn ride_rows_without_media_tags_keep_playback() {
        let rows = vec![
            Row::number("cadence", 80.0),
            Row::number("speed", 0.0),
            Row::number("distance", 0.0),
        ];
        let prior = playing_prior();
        let decoded = decode_rows(&prior, &rows);
        let snap = decoded.snapshot;
        assert_eq!(snap.cadence, 80.0);
        assert_eq!(snap.speed, 0.0);
        assert_eq!(snap.distance, 0.0);
        assert_eq!(snap.playback_state, PlaybackState::Playing);
        assert_eq!(snap.playback_position, 40);
        assert_eq!(snap.position_observed_at, prior.position_observed_at);
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn empty_result_zeroes_ride_metrics_only() {
        let prior = playing_prior();
        let decoded = decode_rows(&prior, &[]);
        assert_eq!(decoded.snapshot.cadence, 0.0);
        assert_eq!(decoded.snapshot.speed, 0.0);
        assert_eq!(decoded.snapshot.distance, 0.0);
        assert_eq!(decoded.snapshot.playback_state, PlaybackState::Playing);
        assert_eq!(decoded.snapshot.playback_position, 40);
    }

    #[test]
    fn rows_apply_in_any_order() {
        let rows = vec![
            Row::number("mp_pos", 125.9).at("2024-05-04T18:30:00Z"),
            Row::text("mp_state", "paused"),
            Row::number("distance", 3.25),
            Row::text("cadence", "91.4"),
        ];
        let snap = decode_rows(&StatusSnapshot::default(), &rows).snapshot;
        assert_eq!(snap.cadence, 91.4);
        assert_eq!(snap.distance, 3.25);
        assert_eq!(snap.playback_state, PlaybackState::Paused);
        assert_eq!(snap.playback_position, 125);
        assert_eq!(
            snap.position_observed_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 4, 18, 30, 0).unwrap())
        );
    }

    #[test]
    fn unknown_state_maps_to_off() {
        let rows = vec![Row::text("mp_state", "buffering")];
        let snap = decode_rows(&playing_prior(), &rows).snapshot;
        assert_eq!(snap.playback_state, PlaybackState::Off);
    }

    #[test]
    fn malformed_metric_reads_as_zero_with_error() {
        let rows = vec![Row::text("cadence", "n/a"), Row::number("speed", -4.0)];
        let decoded = decode_rows(&playing_prior(), &rows);
        assert_eq!(decoded.snapshot.cadence, 0.0);
        assert_eq!(decoded.snapshot.speed, 0.0);
        assert_eq!(decoded.errors.len(), 2);
        assert_eq!(decoded.errors[0].tag, "cadence");
        assert!(decoded.errors[0].reason.contains("non-numeric"));
        assert!(decoded.errors[1].reason.contains("negative"));
    }

    #[test]
    fn numeric_state_is_rejected_and_prior_kept() {
        let rows = vec![Row::number("mp_state", 1.0)];
        let decoded = decode_rows(&playing_prior(), &rows);
        assert_eq!(decoded.snapshot.playback_state, PlaybackState::Playing);
        assert_eq!(decoded.errors.len(), 1);
    }

    #[test]
    fn position_without_valid_time_leaves_anchor_untouched() {
        let prior = playing_prior();
        for row in [
            Row::number("mp_pos", 300.0),
            Row::number("mp_pos", 300.0).at("yesterday"),
        ] {
            let decoded = decode_rows(&prior, std::slice::from_ref(&row));
            assert_eq!(decoded.snapshot.playback_position, 40);
            assert_eq!(
                decoded.snapshot.position_observed_at,
                prior.position_observed_at
            );
            assert_eq!(decoded.errors.len(), 1);
        }
    }

    #[test]
    fn oversized_position_is_rejected() {
        let prior = playing_prior();
        let rows = vec![Row::number("mp_pos", 1e19).at("2024-05-04T09:00:00Z")];
        let decoded = decode_rows(&prior, &rows);
        assert_eq!(decoded.errors.len(), 1);
        assert_eq!(decoded.errors[0].tag, "mp_pos");
        assert_eq!(decoded.snapshot.playback_position, 40);

        let edge = vec![Row::number("mp_pos", MAX_POSITION_SECS).at("2024-05-04T09:00:00Z")];
        let decoded = decode_rows(&prior, &edge);
        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.snapshot.playback_position, 1_000_000_000);
    }

    #[test]
    fn timestamps_are_read_as_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 4, 22, 30, 0).unwrap();
        assert_eq!(parse_utc("2024-05-04T22:30:00Z"), Some(expected));
        assert_eq!(parse_utc("2024-05-04T18:30:00-04:00"), Some(expected));
        assert_eq!(parse_utc("2024-05-04T22:30:00"), Some(expected));
        assert_eq!(parse_utc("2024-05-04 22:30:00.000"), Some(expected));
        assert_eq!(parse_utc("not a time"), None);
    }

    #[test]
    fn unknown_tags_are_reported_not_applied() {
        let rows = vec![Row::number("heart_rate", 140.0)];
        let decoded = decode_rows(&StatusSnapshot::default(), &rows);
        assert_eq!(decoded.unknown_tags, vec!["heart_rate".to_string()]);
        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.snapshot, StatusSnapshot::default());
    }
}
