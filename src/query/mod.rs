//! Boundary with the remote time-series source.
//!
//! The core issues one combined query per poll cycle and receives tagged rows back.
//! Transport and wire format live behind [`RemoteStateClient`].

use std::{fmt, fs, path::Path};

use serde::Deserialize;

use crate::{Error, Result};

pub mod decode;
pub mod fake;
pub mod retry;

pub use decode::{decode_rows, DecodeError, Decoded};
pub use fake::ScriptedClient;
pub use retry::retry;

pub const TAG_CADENCE: &str = "cadence";
pub const TAG_SPEED: &str = "speed";
pub const TAG_DISTANCE: &str = "distance";
pub const TAG_MP_STATE: &str = "mp_state";
pub const TAG_MP_POS: &str = "mp_pos";

/// A row's `_value`: numeric for the ride metrics, text for `mp_state`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    Number(f64),
    Text(String),
}

/// One tagged record of a combined-query result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Row {
    pub tag: String,
    #[serde(rename = "_value")]
    pub value: RowValue,
    #[serde(rename = "_time", default)]
    pub time: Option<String>,
}

impl Row {
    pub fn number(tag: &str, value: f64) -> Self {
        Self {
            tag: tag.to_string(),
            value: RowValue::Number(value),
            time: None,
        }
    }

    pub fn text(tag: &str, value: &str) -> Self {
        Self {
            tag: tag.to_string(),
            value: RowValue::Text(value.to_string()),
            time: None,
        }
    }

    pub fn at(mut self, time: &str) -> Self {
        self.time = Some(time.to_string());
        self
    }
}

/// Failure of a single query attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The request never produced a result set.
    Transport(String),
    /// The source answered with an error instead of rows.
    Remote(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Transport(msg) => write!(f, "transport: {msg}"),
            QueryError::Remote(msg) => write!(f, "remote: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Executes query text against the remote source.
pub trait RemoteStateClient: Send {
    fn query(&mut self, text: &str) -> std::result::Result<Vec<Row>, QueryError>;
}

impl<C: RemoteStateClient + ?Sized> RemoteStateClient for Box<C> {
    fn query(&mut self, text: &str) -> std::result::Result<Vec<Row>, QueryError> {
        (**self).query(text)
    }
}

/// Flux text that unions the five tagged sub-queries into one result set.
pub fn combined_query(bucket: &str) -> String {
    let windowed = |measurement: &str, tag: &str| {
        format!(
            "{tag} = from(bucket: \"{bucket}\")\n\
             \x20 |> range(start: -2h)\n\
             \x20 |> filter(fn: (r) => r._measurement == \"{measurement}\" and r._field == \"value\")\n\
             \x20 |> aggregateWindow(every: 5s, fn: median)\n\
             \x20 |> fill(value: 0.0)\n\
             \x20 |> movingAverage(n: 3)\n\
             \x20 |> last()\n\
             \x20 |> set(key: \"tag\", value: \"{tag}\")\n"
        )
    };
    let latest = |measurement: &str, tag: &str| {
        format!(
            "{tag} = from(bucket: \"{bucket}\")\n\
             \x20 |> range(start: -2h)\n\
             \x20 |> filter(fn: (r) => r._measurement == \"{measurement}\" and r._field == \"value\")\n\
             \x20 |> last()\n\
             \x20 |> set(key: \"tag\", value: \"{tag}\")\n"
        )
    };
    let mut text = String::new();
    text.push_str(&windowed("cadence", TAG_CADENCE));
    text.push_str(&windowed("speed", TAG_SPEED));
    text.push_str(&format!(
        "{TAG_DISTANCE} = from(bucket: \"{bucket}\")\n\
         \x20 |> range(start: -12h)\n\
         \x20 |> filter(fn: (r) => r._measurement == \"speed\" and r._field == \"value\")\n\
         \x20 |> integral(unit: 1h)\n\
         \x20 |> set(key: \"tag\", value: \"{TAG_DISTANCE}\")\n"
    ));
    text.push_str(&latest("media_player_state", TAG_MP_STATE));
    text.push_str(&latest("media_player_position", TAG_MP_POS));
    text.push_str(&format!(
        "union(tables: [{TAG_CADENCE}, {TAG_SPEED}, {TAG_DISTANCE}, {TAG_MP_STATE}, {TAG_MP_POS}])\n\
         \x20 |> keep(columns: [\"tag\", \"_value\", \"_time\"])\n"
    ));
    text
}

/// Read a JSON array of rows, e.g. a captured result set.
pub fn load_rows_file(path: &Path) -> Result<Vec<Row>> {
    let raw = fs::read_to_string(path)?;
    parse_rows_json(&raw)
}

pub fn parse_rows_json(raw: &str) -> Result<Vec<Row>> {
    serde_json::from_str(raw).map_err(|e| Error::Parse(format!("rows json: {e}")))
}
