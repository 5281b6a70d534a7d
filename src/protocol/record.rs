use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::payload::{decode, lenient_opt_u32, lenient_opt_u64};

/// One record as the backend sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub token: Option<u64>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where a record came from in the MI output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    /// `^done`, `^error`, ... answering a command.
    Result,
    /// `*stopped`, `=breakpoint-modified`, ...
    Notify,
    /// Console, log and target text.
    Stream,
    Unknown,
}

impl RecordClass {
    fn classify(kind: Option<&str>, message: Option<&str>) -> Self {
        match kind {
            Some("result") => RecordClass::Result,
            Some("notify") => RecordClass::Notify,
            Some("console") | Some("log") | Some("target") | Some("output") => RecordClass::Stream,
            Some(_) => RecordClass::Unknown,
            None => match message {
                Some("done") | Some("error") | Some("running") | Some("connected")
                | Some("exit") => RecordClass::Result,
                Some("stopped") => RecordClass::Notify,
                _ => RecordClass::Unknown,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    ExitedNormally,
    Exited,
    /// breakpoint-hit, end-stepping-range, function-finished, ...
    Other(String),
}

impl StopReason {
    pub fn parse(text: &str) -> Self {
        match text {
            "exited-normally" => StopReason::ExitedNormally,
            "exited" => StopReason::Exited,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// The record kinds that carry state.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
    Stopped {
        line: Option<u32>,
        reason: Option<StopReason>,
    },
    /// `^done` acknowledging a breakpoint insertion.
    BreakpointInserted { line: Option<u32> },
    Other { message: Option<String> },
}

#[derive(Debug, Deserialize)]
struct LineField {
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    line: Option<u32>,
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub token: Option<u64>,
    pub class: RecordClass,
    pub kind: RecordKind,
    pub payload: Option<Value>,
}

impl Record {
    pub fn is_result(&self) -> bool {
        self.class == RecordClass::Result
    }

    pub fn is_error(&self) -> bool {
        self.is_result() && matches!(&self.kind, RecordKind::Other { message: Some(m) } if m == "error")
    }

    /// The `msg` of an `^error` record.
    pub fn error_message(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        self.payload.as_ref()?.get("msg")?.as_str()
    }
}

fn line_of(value: Option<&Value>) -> Option<u32> {
    value.and_then(decode::<LineField>).and_then(|f| f.line)
}

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        let class = RecordClass::classify(raw.kind.as_deref(), raw.message.as_deref());
        let payload = raw.payload.filter(|p| !p.is_null());

        let kind = match raw.message.as_deref() {
            Some("stopped") => {
                let frame = payload.as_ref().and_then(|p| p.get("frame"));
                let reason = payload
                    .as_ref()
                    .and_then(|p| p.get("reason"))
                    .or_else(|| raw.extra.get("reason"))
                    .and_then(Value::as_str)
                    .map(StopReason::parse);
                RecordKind::Stopped {
                    line: line_of(frame),
                    reason,
                }
            }
            Some("done") if payload.as_ref().is_some_and(|p| p.get("bkpt").is_some()) => {
                let bkpt = payload.as_ref().and_then(|p| p.get("bkpt"));
                RecordKind::BreakpointInserted {
                    line: line_of(bkpt),
                }
            }
            _ => RecordKind::Other {
                message: raw.message,
            },
        };

        Record {
            token: raw.token,
            class,
            kind,
            payload,
        }
    }
}

/// Decode a batch of wire records in order.
pub fn decode_records(raw: Vec<RawRecord>) -> Vec<Record> {
    raw.into_iter().map(Record::from).collect()
}

/// The result record answering the command issued with `token`.
///
/// Falls back to the first result record when the backend echoed no tokens at all.
pub fn correlate(records: &[Record], token: Option<u64>) -> Option<&Record> {
    if let Some(token) = token {
        if let Some(found) = records
            .iter()
            .find(|r| r.token == Some(token) && r.is_result())
        {
            return Some(found);
        }
        if records.iter().any(|r| r.token.is_some()) {
            return None;
        }
    }
    records.iter().find(|r| r.is_result())
}
