//! Function entry/exit event input.
//!
//! Reads a JSON event file and replays it through the call stack recorder
//! to produce the state system the call tree builder queries.
//!
//! ```json
//! { "end": 100,
//!   "events": [
//!     { "ts": 0,  "pid": 1, "tid": 1, "kind": "entry", "symbol": "main" },
//!     { "ts": 10, "pid": 1, "tid": 1, "kind": "entry", "symbol": 4096 },
//!     { "ts": 30, "pid": 1, "tid": 1, "kind": "exit" } ] }
//! ```

use crate::oracle::{CallStackRecorder, MemoryStateSystem, StateValue};
use crate::utils::error::ParseError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Whether a function was entered or left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Entry,
    Exit,
}

/// One entry or exit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub ts: i64,
    pub pid: i32,
    pub tid: i32,
    pub kind: EventKind,

    /// Function identifier; only read on entry
    #[serde(default)]
    pub symbol: Value,
}

/// Top-level event file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceEvents {
    /// Start of the recorded state (defaults to the first event)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// End of the recorded state (defaults to the last event); calls still
    /// open at the end are closed here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,

    pub events: Vec<CallEvent>,
}

impl TraceEvents {
    /// First and last timestamps of the state, defaulting to the events' bounds
    pub fn bounds(&self) -> (i64, i64) {
        let first = self.events.iter().map(|e| e.ts).min();
        let last = self.events.iter().map(|e| e.ts).max();

        let start = self.start.or(first).unwrap_or(0);
        let end = self.end.or(last).unwrap_or(start).max(start);
        (start, end)
    }
}

/// Parse an event file's contents
///
/// # Errors
/// * `ParseError::JsonError` - Invalid JSON or missing fields
/// * `ParseError::InvalidFormat` - Events before `start` or after `end`
pub fn parse_events(raw: &str) -> Result<TraceEvents, ParseError> {
    let events: TraceEvents = serde_json::from_str(raw)?;
    validate_events(&events)?;
    debug!("Parsed {} call events", events.events.len());
    Ok(events)
}

/// Read and parse an event file
///
/// **Public** - entry point of the CLI input path
pub fn read_events(path: impl AsRef<Path>) -> Result<TraceEvents, ParseError> {
    let path = path.as_ref();
    debug!("Reading events from: {}", path.display());
    let raw = fs::read_to_string(path)?;
    parse_events(&raw)
}

fn validate_events(events: &TraceEvents) -> Result<(), ParseError> {
    let (start, end) = events.bounds();

    if let (Some(s), Some(e)) = (events.start, events.end) {
        if s > e {
            return Err(ParseError::InvalidFormat(format!(
                "start {} is after end {}",
                s, e
            )));
        }
    }

    if let Some(event) = events.events.iter().find(|e| e.ts < start || e.ts > end) {
        return Err(ParseError::InvalidFormat(format!(
            "event at {} lies outside [{}, {}]",
            event.ts, start, end
        )));
    }

    Ok(())
}

/// Decode the JSON symbol of an entry event into a state value
///
/// Integers that fit in 32 bits become `Int`, other integers `Long`. Floats
/// and structured values are carried through as `Double`/`Custom` and are
/// rejected later by the call tree builder.
pub fn symbol_value(symbol: &Value) -> Result<StateValue, ParseError> {
    match symbol {
        Value::Null => Err(ParseError::InvalidFormat(
            "entry event without a symbol".to_string(),
        )),
        Value::String(s) => Ok(StateValue::Str(s.clone())),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(match i32::try_from(v) {
                    Ok(small) => StateValue::Int(small),
                    Err(_) => StateValue::Long(v),
                })
            } else if let Some(v) = n.as_f64() {
                Ok(StateValue::Double(v))
            } else {
                Err(ParseError::InvalidFormat(format!(
                    "symbol {} does not fit in 64 bits",
                    n
                )))
            }
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            Ok(StateValue::Custom(symbol.to_string()))
        }
    }
}

/// Replay events into a fresh state system
///
/// **Public** - produces the oracle the analysis runs against
///
/// Events are replayed in timestamp order; events sharing a timestamp keep
/// their file order.
///
/// # Errors
/// * `ParseError::InvalidFormat` - An entry event has no symbol
/// * `ParseError::State` - The recorder rejected an event
pub fn load_state(events: &TraceEvents) -> Result<MemoryStateSystem, ParseError> {
    let (start, end) = events.bounds();

    let mut ordered: Vec<&CallEvent> = events.events.iter().collect();
    ordered.sort_by_key(|e| e.ts);

    let mut recorder = CallStackRecorder::new(start);
    for event in ordered {
        match event.kind {
            EventKind::Entry => {
                let value = symbol_value(&event.symbol)?;
                recorder.enter(event.ts, event.pid, event.tid, value)?;
            }
            EventKind::Exit => recorder.exit(event.ts, event.pid, event.tid)?,
        }
    }

    let state = recorder.finish(end)?;
    info!(
        "Loaded {} events into state [{}, {}] ({} attributes)",
        events.events.len(),
        state.start_time(),
        state.end_time(),
        state.attribute_count()
    );

    Ok(state)
}
