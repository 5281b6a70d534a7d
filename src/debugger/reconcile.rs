use super::state::{ExecState, ProgramState};
use crate::protocol::{Record, RecordKind, StopReason};

/// Fold a batch of records into `state`, in order.
///
/// Later records win, so an intermediate status inside a run-to-breakpoint batch is
/// superseded by the final one. Records that carry no state are ignored.
pub fn update_state(state: &mut ProgramState, records: &[Record]) {
    for record in records {
        match &record.kind {
            RecordKind::Stopped { line, reason } => {
                if let Some(line) = line {
                    state.line_num = *line;
                }
                if let Some(reason) = reason {
                    state.exec_state = match reason {
                        StopReason::ExitedNormally => ExecState::ExitedNormally,
                        StopReason::Exited => ExecState::Exited,
                        StopReason::Other(_) => ExecState::Stopped,
                    };
                }
            }
            RecordKind::BreakpointInserted { line } => {
                if let Some(line) = line {
                    state.line_num = *line;
                }
                state.exec_state = ExecState::Stopped;
            }
            RecordKind::Other { .. } => {}
        }
    }
}
