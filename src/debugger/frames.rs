use serde::Deserialize;
use std::collections::HashMap;

use super::session::{Session, VariableLookup};
use super::state::{Frame, FrameInfo, Variable};
use crate::error::{BridgeError, Result};
use crate::protocol::payload::{decode, hex_literal, ListedVariable, ValuePayload, VariablesPayload};
use crate::protocol::{correlate, MiCommand, Record, ValuesMode};
use crate::transport::Transport;

// Entries come either bare or wrapped as {"frame": {...}} depending on the MI parser.
#[derive(Deserialize)]
#[serde(untagged)]
enum StackEntry {
    Wrapped { frame: FrameInfo },
    Bare(FrameInfo),
}

impl StackEntry {
    fn into_info(self) -> FrameInfo {
        match self {
            StackEntry::Wrapped { frame } | StackEntry::Bare(frame) => frame,
        }
    }
}

#[derive(Deserialize)]
struct StackPayload {
    #[serde(default)]
    stack: Vec<StackEntry>,
}

/// Join the two listings of one frame by variable name.
///
/// Values come from the all-values listing, types from the simple-values one. Repeated
/// names (shadowing blocks) are paired by occurrence, in listing order.
pub fn merge_variables(
    level: u32,
    all: Vec<ListedVariable>,
    simple: Vec<ListedVariable>,
) -> Result<Vec<Variable>> {
    let mut types: HashMap<(String, usize), String> = HashMap::with_capacity(simple.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for listed in simple {
        let n = seen.entry(listed.name.clone()).or_insert(0);
        types.insert((listed.name, *n), listed.ty.unwrap_or_default());
        *n += 1;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut merged = Vec::with_capacity(all.len());
    for listed in all {
        let n = seen.entry(listed.name.clone()).or_insert(0);
        let key = (listed.name, *n);
        *n += 1;

        let ty = types.remove(&key).ok_or_else(|| {
            BridgeError::ProtocolMismatch(format!(
                "frame {}: {:?} has a value but no type",
                level, key.0
            ))
        })?;
        merged.push(Variable {
            name: key.0,
            value: listed.value.unwrap_or_default(),
            ty,
            address: None,
            size: None,
        });
    }

    if let Some(((name, _), _)) = types.into_iter().next() {
        return Err(BridgeError::ProtocolMismatch(format!(
            "frame {}: {:?} has a type but no value",
            level, name
        )));
    }
    Ok(merged)
}

/// Order frames so that index == level, innermost first.
///
/// Levels must run densely from 0. A missing level is reported, never filled in.
pub fn index_by_level(frames: Vec<Frame>) -> Result<Vec<Frame>> {
    let count = frames.len();
    let mut slots: Vec<Option<Frame>> = (0..count).map(|_| None).collect();

    for frame in frames {
        let level = frame.level();
        match slots.get_mut(level) {
            Some(slot) if slot.is_none() => *slot = Some(frame),
            // Out of range or a duplicate; either way some lower level is now unfilled.
            _ => tracing::warn!(level, count, "frame level does not fit the stack"),
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(level, slot)| {
            slot.ok_or(BridgeError::FrameGap {
                level,
                frames: count,
            })
        })
        .collect()
}

fn evaluated(record: Option<&Record>) -> Option<String> {
    let payload = record?.payload.as_ref()?;
    decode::<ValuePayload>(payload).map(|v| v.value)
}

fn address_from(record: Option<&Record>) -> Option<String> {
    evaluated(record).and_then(|text| hex_literal(&text).map(str::to_string))
}

fn size_from(record: Option<&Record>) -> Option<u64> {
    evaluated(record).and_then(|text| text.trim().parse().ok())
}

impl<T: Transport> Session<T> {
    /// Rebuild the call stack with every frame's variables.
    #[tracing::instrument(skip(self), fields(session = self.id()))]
    pub async fn get_frames(&mut self) -> Result<&[Frame]> {
        let listing = self.command(MiCommand::StackListFrames).await?;
        // No stack ("^error" once the program has exited) means no frames.
        let infos: Vec<FrameInfo> = listing
            .result_payload()
            .and_then(decode::<StackPayload>)
            .map(|p| p.stack.into_iter().map(StackEntry::into_info).collect())
            .unwrap_or_default();

        let mut frames = Vec::with_capacity(infos.len());
        for info in infos {
            let level = info.level;
            let all = self.list_variables(level, ValuesMode::All).await?;
            let simple = self.list_variables(level, ValuesMode::Simple).await?;
            let mut variables = merge_variables(level, all, simple)?;

            if self.options.resolve_addresses {
                for variable in &mut variables {
                    let (address, size) = self.locate(level, &variable.name).await?;
                    variable.address = address;
                    variable.size = size;
                }
            }
            frames.push(Frame { info, variables });
        }

        self.state.frames = index_by_level(frames)?;
        tracing::debug!(frames = self.state.frames.len(), "call stack rebuilt");
        Ok(&self.state.frames)
    }

    async fn list_variables(&mut self, frame: u32, values: ValuesMode) -> Result<Vec<ListedVariable>> {
        let reply = self
            .command(MiCommand::StackListVariables {
                thread: self.options.thread,
                frame,
                values,
            })
            .await?;
        Ok(reply
            .result_payload()
            .and_then(decode::<VariablesPayload>)
            .map(|p| p.variables)
            .unwrap_or_default())
    }

    /// Address and size of `name` in `frame`. Either may be unknown.
    async fn locate(&mut self, frame: u32, name: &str) -> Result<(Option<String>, Option<u64>)> {
        let thread = self.options.thread;
        match self.options.variable_lookup {
            VariableLookup::Commands => {
                let address = self.command(MiCommand::address_of(thread, frame, name)).await?;
                let size = self.command(MiCommand::size_of(thread, frame, name)).await?;
                Ok((address_from(address.result()), size_from(size.result())))
            }
            VariableLookup::Endpoint => {
                let location = self
                    .round_trip("variable", self.transport.variable(self.id(), frame, name))
                    .await?;
                Ok((
                    address_from(correlate(&location.address, None)),
                    size_from(correlate(&location.size, None)),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(name: &str, value: Option<&str>, ty: Option<&str>) -> ListedVariable {
        ListedVariable {
            name: name.to_string(),
            value: value.map(str::to_string),
            ty: ty.map(str::to_string),
        }
    }

    fn frame_at(level: u32) -> Frame {
        Frame::new(FrameInfo {
            level,
            function: format!("f{}", level),
            ..FrameInfo::default()
        })
    }

    #[test]
    fn merge_takes_value_and_type_from_separate_listings() {
        let all = vec![listed("a", Some("1"), None), listed("b", Some("{x = 2}"), None)];
        let simple = vec![listed("b", None, Some("struct pt")), listed("a", Some("1"), Some("int"))];

        let merged = merge_variables(0, all, simple).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].name.as_str(), merged[0].ty.as_str()), ("a", "int"));
        assert_eq!(merged[1].value, "{x = 2}");
        assert_eq!(merged[1].ty, "struct pt");
    }

    #[test]
    fn merge_pairs_shadowed_names_by_occurrence() {
        let all = vec![listed("i", Some("3"), None), listed("i", Some("7"), None)];
        let simple = vec![listed("i", None, Some("int")), listed("i", None, Some("long"))];

        let merged = merge_variables(1, all, simple).unwrap();
        assert_eq!(merged[0].value, "3");
        assert_eq!(merged[0].ty, "int");
        assert_eq!(merged[1].value, "7");
        assert_eq!(merged[1].ty, "long");
    }

    #[test]
    fn merge_rejects_disagreeing_listings() {
        let err = merge_variables(0, vec![listed("a", Some("1"), None)], vec![]).unwrap_err();
        assert!(matches!(err, BridgeError::ProtocolMismatch(_)));

        let err = merge_variables(0, vec![], vec![listed("a", None, Some("int"))]).unwrap_err();
        assert!(matches!(err, BridgeError::ProtocolMismatch(_)));
    }

    #[test]
    fn index_orders_by_level() {
        let frames = index_by_level(vec![frame_at(1), frame_at(0), frame_at(2)]).unwrap();
        let levels: Vec<usize> = frames.iter().map(Frame::level).collect();
        assert_eq!(levels, vec![0, 1, 2]);
    }

    #[test]
    fn index_reports_gap() {
        let err = index_by_level(vec![frame_at(0), frame_at(2)]).unwrap_err();
        assert!(matches!(err, BridgeError::FrameGap { level: 1, frames: 2 }));
    }

    #[test]
    fn stack_payload_accepts_wrapped_entries() {
        let payload = serde_json::json!({
            "stack": [{"frame": {"level": "0", "addr": "0x1", "func": "main", "line": "4"}}]
        });
        let stack = decode::<StackPayload>(&payload).unwrap();
        let info = stack.stack.into_iter().next().unwrap().into_info();
        assert_eq!(info.function, "main");
        assert_eq!(info.line, Some(4));
    }
}
