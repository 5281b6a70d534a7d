use crate::protocol::MiCommand;

/// Execution-control operations that move the debuggee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecControl {
    /// Single source line, entering calls.
    StepInto,
    /// Single source line, stepping over calls.
    StepOver,
    /// Re-run from the start.
    Restart,
}

impl ExecControl {
    pub fn command(self) -> MiCommand {
        match self {
            ExecControl::StepInto => MiCommand::ExecStep,
            ExecControl::StepOver => MiCommand::ExecNext,
            ExecControl::Restart => MiCommand::ExecRun,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExecControl::StepInto => "step",
            ExecControl::StepOver => "next",
            ExecControl::Restart => "restart",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "s" | "step" | "stepIn" | "stepInto" => Some(ExecControl::StepInto),
            "n" | "next" | "stepOver" => Some(ExecControl::StepOver),
            "r" | "restart" | "run" => Some(ExecControl::Restart),
            _ => None,
        }
    }
}
