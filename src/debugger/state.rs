use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::payload::{
    lenient_list, lenient_opt_u32, lenient_opt_u64, lenient_u32, lenient_u64, parse_address,
};

/// Smallest address span the heap view zooms to.
pub const MIN_ADDRESS_SPAN: u64 = 200;

/// Coarse run state of the debuggee as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecState {
    Stopped,
    Running,
    ExitedNormally,
    Exited,
    /// No program loaded.
    #[default]
    #[serde(alias = "")]
    Edit,
}

impl ExecState {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecState::Stopped => "stopped",
            ExecState::Running => "running",
            ExecState::ExitedNormally => "exited-normally",
            ExecState::Exited => "exited",
            ExecState::Edit => "edit",
        }
    }

    /// Step and next only make sense while paused.
    pub fn can_step(self) -> bool {
        self == ExecState::Stopped
    }
}

impl fmt::Display for ExecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame description as reported by `-stack-list-frames`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    #[serde(rename = "addr", default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    #[serde(rename = "func", default)]
    pub function: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub level: u32,
    #[serde(
        default,
        deserialize_with = "lenient_opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<u64>,
}

impl Variable {
    pub fn address_value(&self) -> Option<u64> {
        self.address.as_deref().and_then(parse_address)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "frameInfo")]
    pub info: FrameInfo,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Frame {
    pub fn new(info: FrameInfo) -> Self {
        Self {
            info,
            variables: Vec::new(),
        }
    }

    pub fn level(&self) -> usize {
        self.info.level as usize
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// One live heap allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub address: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub size: u64,
}

/// Address extent of the heap; `Empty` when there is nothing to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapBounds {
    Empty,
    Span { min: u64, max: u64 },
}

impl HeapBounds {
    pub fn is_degenerate(&self) -> bool {
        matches!(self, HeapBounds::Empty)
    }

    pub fn min(&self) -> Option<u64> {
        match self {
            HeapBounds::Empty => None,
            HeapBounds::Span { min, .. } => Some(*min),
        }
    }

    pub fn max(&self) -> Option<u64> {
        match self {
            HeapBounds::Empty => None,
            HeapBounds::Span { max, .. } => Some(*max),
        }
    }
}

/// Snapshot of the debuggee as understood by the front end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramState {
    #[serde(default)]
    pub exec_state: ExecState,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_num: u32,
    #[serde(default, deserialize_with = "lenient_list")]
    pub frames: Vec<Frame>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub heap: Vec<Allocation>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub output: Vec<String>,
}

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Innermost frame.
    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn frame(&self, level: usize) -> Option<&Frame> {
        self.frames.get(level)
    }

    /// Drop everything observed about the last program.
    pub fn reset_for_edit(&mut self) {
        *self = ProgramState::new();
    }

    pub fn heap_bounds(&self) -> HeapBounds {
        let mut addresses = self.heap.iter().filter_map(|a| {
            let parsed = parse_address(&a.address);
            if parsed.is_none() {
                tracing::warn!(address = %a.address, "skipping allocation with unparsable address");
            }
            parsed
        });

        let first = match addresses.next() {
            Some(first) => first,
            None => return HeapBounds::Empty,
        };
        let (min, max) = addresses.fold((first, first), |(lo, hi), a| (lo.min(a), hi.max(a)));
        HeapBounds::Span { min, max }
    }

    /// Heap range to draw, widened to at least `min_span` bytes.
    pub fn heap_zoom(&self, min_span: u64) -> Option<(u64, u64)> {
        match self.heap_bounds() {
            HeapBounds::Empty => None,
            HeapBounds::Span { min, max } => {
                let end = if max - min < min_span {
                    min.saturating_add(min_span)
                } else {
                    max
                };
                Some((min, end))
            }
        }
    }

    /// The stack variable with the lowest resolved address, across all frames.
    pub fn lowest_stack_variable(&self) -> Option<&Variable> {
        self.frames
            .iter()
            .flat_map(|f| f.variables.iter())
            .filter_map(|v| v.address_value().map(|a| (a, v)))
            .min_by_key(|(a, _)| *a)
            .map(|(_, v)| v)
    }

    /// `key,value` lines for logs and diffs.
    pub fn summary(&self) -> String {
        let heap: Vec<String> = self
            .heap
            .iter()
            .map(|a| format!("{}: {}", a.address, a.size))
            .collect();
        format!(
            "execState,{}\nlineNum,{}\nheap,{}\n",
            self.exec_state,
            self.line_num,
            heap.join(";")
        )
    }
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exec_state {
            ExecState::Stopped => writeln!(f, "=== Program paused, next line {} ===", self.line_num)?,
            state => writeln!(f, "=== Program {} ===", state)?,
        }

        if self.frames.is_empty() {
            writeln!(f, "\n=== Call Stack: <empty> ===")?;
        } else {
            writeln!(f, "\n=== Call Stack ({} frames) ===", self.frames.len())?;
            for frame in &self.frames {
                let at = match (&frame.info.file, frame.info.line) {
                    (Some(file), Some(line)) => format!(" at {}:{}", file, line),
                    _ => String::new(),
                };
                writeln!(
                    f,
                    "  #{}: {}{} ({})",
                    frame.info.level, frame.info.function, at, frame.info.address
                )?;
                for var in &frame.variables {
                    write!(f, "      {} {} = {}", var.ty, var.name, var.value)?;
                    if let Some(address) = &var.address {
                        write!(f, "  @{}", address)?;
                    }
                    if let Some(size) = var.size {
                        write!(f, " [{} bytes]", size)?;
                    }
                    writeln!(f)?;
                }
            }
        }

        if !self.heap.is_empty() {
            writeln!(f, "\n=== Heap ({} allocations) ===", self.heap.len())?;
            for allocation in &self.heap {
                writeln!(f, "  {}: {} bytes", allocation.address, allocation.size)?;
            }
        }

        if !self.output.is_empty() {
            writeln!(f, "\n=== Output ===")?;
            for line in &self.output {
                writeln!(f, "  {}", line)?;
            }
        }
        Ok(())
    }
}
