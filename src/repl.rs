use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::debugger::{ExecControl, ExecState, Session, MIN_ADDRESS_SPAN};
use crate::error::{BridgeError, Result};
use crate::protocol::{MiCommand, Record};
use crate::transport::Transport;

const HELP: &str = "Commands: (s)tep, (n)ext, (r)estart, (f)rames, (h)eap, (o)utput, \
raw <mi command>, server-step, (l)oad <file>, (e)dit, (q)uit";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Control(ExecControl),
    Frames,
    Heap,
    Output,
    /// MI text sent as typed, e.g. `raw -exec-continue`.
    Raw(String),
    ServerStep,
    Load(String),
    Edit,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Parse one prompt line. Empty input steps over.
pub fn parse_line(line: &str) -> std::result::Result<ReplCommand, String> {
    let words = shlex::split(line).ok_or_else(|| format!("unbalanced quotes in {:?}", line))?;
    let Some(first) = words.first() else {
        return Ok(ReplCommand::Control(ExecControl::StepOver));
    };

    if let Some(control) = ExecControl::parse(first) {
        return Ok(ReplCommand::Control(control));
    }

    // Raw MI text keeps its own quoting, so take the rest of the line verbatim.
    let rest = line
        .trim_start()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("");

    match first.as_str() {
        "f" | "frames" => Ok(ReplCommand::Frames),
        "h" | "heap" => Ok(ReplCommand::Heap),
        "o" | "output" => Ok(ReplCommand::Output),
        "server-step" => Ok(ReplCommand::ServerStep),
        "e" | "edit" => Ok(ReplCommand::Edit),
        "?" | "help" => Ok(ReplCommand::Help),
        "q" | "quit" => Ok(ReplCommand::Quit),
        "raw" if !rest.is_empty() => Ok(ReplCommand::Raw(rest.to_string())),
        "raw" => Err("raw needs a command, e.g. raw -exec-continue".to_string()),
        "l" | "load" => match words.get(1) {
            Some(path) => Ok(ReplCommand::Load(path.clone())),
            None => Err("load needs a source file".to_string()),
        },
        other => Err(format!("Unknown command: {}", other)),
    }
}

/// Prompt loop over `input` until quit, end of input or cancellation.
pub async fn run<T, R, W>(session: &mut Session<T>, input: R, out: &mut W) -> Result<()>
where
    T: Transport,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let cancel = session.cancellation_token();
    let mut lines = input.lines();
    loop {
        if cancel.is_cancelled() {
            tracing::info!("session cancelled, leaving prompt");
            break;
        }
        write!(out, "({}) > ", session.state().exec_state)?;
        out.flush()?;

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("interrupted at prompt");
                break;
            }
            next = lines.next_line() => next?,
        };
        let Some(line) = next else {
            break;
        };
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(msg) => {
                writeln!(out, "❓ {}", msg)?;
                continue;
            }
        };

        match dispatch(session, command, out).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(BridgeError::Cancelled { op }) => {
                tracing::info!(op, "interrupted");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "command failed");
                writeln!(out, "❌ {}", e)?;
            }
        }
    }
    Ok(())
}

async fn dispatch<T, W>(session: &mut Session<T>, command: ReplCommand, out: &mut W) -> Result<Flow>
where
    T: Transport,
    W: Write,
{
    match command {
        ReplCommand::Control(control) => {
            let state = session.state().exec_state;
            let allowed = match control {
                ExecControl::Restart => state != ExecState::Edit,
                _ => state.can_step(),
            };
            if !allowed {
                writeln!(out, "❌ cannot {} while program is {}", control.name(), state)?;
                return Ok(Flow::Continue);
            }
            session.control(control).await?;
            write!(out, "{}", session.state())?;
        }
        ReplCommand::Frames => {
            let frames = session.get_frames().await?.len();
            writeln!(out, "{} frame(s)", frames)?;
            write!(out, "{}", session.state())?;
            if let Some(lowest) = session.state().lowest_stack_variable() {
                writeln!(
                    out,
                    "lowest stack variable: {} @{}",
                    lowest.name,
                    lowest.address.as_deref().unwrap_or("?")
                )?;
            }
        }
        ReplCommand::Heap => {
            let heap = session.get_memory().await?;
            for allocation in heap {
                writeln!(out, "  {}: {} bytes", allocation.address, allocation.size)?;
            }
            match session.state().heap_zoom(MIN_ADDRESS_SPAN) {
                Some((low, high)) => writeln!(out, "heap view 0x{:x}..0x{:x}", low, high)?,
                None => writeln!(out, "heap is empty")?,
            }
        }
        ReplCommand::Output => {
            for line in session.get_output().await? {
                writeln!(out, "{}", line)?;
            }
        }
        ReplCommand::Raw(text) => {
            let reply = session.command(MiCommand::Raw(text)).await?;
            print_records(out, &reply.records)?;
            session.update_state(&reply.records);
        }
        ReplCommand::ServerStep => {
            let state = session.step_on_server().await?;
            write!(out, "{}", state)?;
        }
        ReplCommand::Load(path) => {
            let source = std::fs::read_to_string(Path::new(&path))?;
            load(session, &source, out).await?;
        }
        ReplCommand::Edit => {
            session.edit();
            writeln!(out, "✏️  edit mode, load a file to debug again")?;
        }
        ReplCommand::Help => writeln!(out, "{}", HELP)?,
        ReplCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Load `source`, then pull the full state when it stopped somewhere.
pub async fn load<T, W>(session: &mut Session<T>, source: &str, out: &mut W) -> Result<()>
where
    T: Transport,
    W: Write,
{
    session.load_program(source).await?;
    if session.state().exec_state == ExecState::Stopped {
        session.refresh().await?;
    } else {
        session.get_output().await?;
    }
    write!(out, "{}", session.state())?;
    Ok(())
}

fn print_records<W: Write>(out: &mut W, records: &[Record]) -> Result<()> {
    for record in records {
        if let Some(msg) = record.error_message() {
            writeln!(out, "  ^error {}", msg)?;
            continue;
        }
        let payload = record
            .payload
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default();
        writeln!(out, "  {:?} {:?} {}", record.class, record.kind, payload)?;
    }
    Ok(())
}
