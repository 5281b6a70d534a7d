use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::frames::index_by_level;
use super::reconcile::update_state;
use super::state::{Allocation, ExecState, ProgramState};
use super::stepping::ExecControl;
use crate::error::{BridgeError, Result};
use crate::protocol::payload::hex_literal;
use crate::protocol::{correlate, is_blank, MiCommand, Record, TokenGenerator};
use crate::transport::{SessionId, Transport};

/// How variable addresses and sizes are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableLookup {
    /// Two tokened `-data-evaluate-expression` commands per variable.
    #[default]
    Commands,
    /// The backend's variable endpoint.
    Endpoint,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub request_timeout: Duration,
    pub close_timeout: Duration,
    pub thread: u32,
    pub resolve_addresses: bool,
    pub variable_lookup: VariableLookup,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_millis(500),
            thread: 1,
            resolve_addresses: true,
            variable_lookup: VariableLookup::Commands,
        }
    }
}

/// Records produced by one issued command, with the token it was sent under.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub token: Option<u64>,
    pub records: Vec<Record>,
}

impl Reply {
    /// The result record answering this command.
    pub fn result(&self) -> Option<&Record> {
        correlate(&self.records, self.token)
    }

    pub fn result_payload(&self) -> Option<&Value> {
        self.result()?.payload.as_ref()
    }
}

/// One debugger instance on the backend and everything known about its debuggee.
///
/// Every operation takes `&mut self`: a session runs one round trip at a time.
pub struct Session<T: Transport> {
    id: SessionId,
    pub(super) transport: Arc<T>,
    tokens: TokenGenerator,
    pub(super) state: ProgramState,
    pub(super) options: SessionOptions,
    cancel: CancellationToken,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub async fn start(transport: T, options: SessionOptions) -> Result<Self> {
        Self::start_shared(Arc::new(transport), options).await
    }

    /// Like [`Session::start`], for a transport the caller keeps a handle on.
    #[tracing::instrument(skip_all)]
    pub async fn start_shared(transport: Arc<T>, options: SessionOptions) -> Result<Self> {
        let started = Instant::now();
        let after = options.request_timeout;
        let id = tokio::time::timeout(after, transport.start())
            .await
            .unwrap_or_else(|_| Err(BridgeError::Timeout { op: "start", after }))?;
        tracing::info!(
            session = id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "debugger session started"
        );

        Ok(Self {
            id,
            transport,
            tokens: TokenGenerator::new(),
            state: ProgramState::new(),
            options,
            cancel: CancellationToken::new(),
            closed: false,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> &ProgramState {
        &self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Cancelling this token aborts whatever round trip is in flight.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reserve a correlation token for a hand-written command.
    pub fn next_token(&mut self) -> u64 {
        self.tokens.next()
    }

    pub(super) async fn round_trip<R, F>(&self, op: &'static str, fut: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        let started = Instant::now();
        let after = self.options.request_timeout;
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BridgeError::Cancelled { op }),
            outcome = tokio::time::timeout(after, fut) => {
                outcome.unwrap_or_else(|_| Err(BridgeError::Timeout { op, after }))
            }
        };
        tracing::debug!(
            op,
            session = self.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "round trip"
        );
        result
    }

    /// Fold records into the program state.
    pub fn update_state(&mut self, records: &[Record]) {
        update_state(&mut self.state, records);
    }

    /// Upload, compile, break in `main` and run. The records are returned unfolded.
    #[tracing::instrument(skip(self, source), fields(session = self.id, bytes = source.len()))]
    pub async fn load_and_run(&mut self, source: &str) -> Result<Vec<Record>> {
        let records = self
            .round_trip("load_and_run", self.transport.load_and_run(self.id, source))
            .await?;
        tracing::info!(records = records.len(), "program loaded");
        Ok(records)
    }

    /// Start over with `source`: fresh state, load and run, fold the result.
    pub async fn load_program(&mut self, source: &str) -> Result<Vec<Record>> {
        self.state.reset_for_edit();
        let records = self.load_and_run(source).await?;
        self.update_state(&records);
        Ok(records)
    }

    /// Send command text that already carries its token. Blank text sends nothing.
    pub async fn raw_command(&mut self, text: &str) -> Result<Vec<Record>> {
        if is_blank(text) {
            return Ok(Vec::new());
        }
        self.round_trip("command", self.transport.command(self.id, text))
            .await
    }

    /// Issue `command` under a fresh token.
    pub async fn command(&mut self, command: MiCommand) -> Result<Reply> {
        if is_blank(&command.render()) {
            return Ok(Reply::default());
        }
        let token = if command.accepts_token() {
            Some(self.tokens.next())
        } else {
            None
        };
        let text = match token {
            Some(token) => command.tokened(token),
            None => command.render(),
        };
        tracing::debug!(session = self.id, token, command = %text, "issuing command");

        let records = self.raw_command(&text).await?;
        Ok(Reply { token, records })
    }

    /// Replace the heap snapshot.
    pub async fn get_memory(&mut self) -> Result<&[Allocation]> {
        let heap = self
            .round_trip("memory", self.transport.memory(self.id))
            .await?;
        self.state.heap = heap;
        Ok(&self.state.heap)
    }

    /// Replace the captured output.
    pub async fn get_output(&mut self) -> Result<&[String]> {
        let output = self
            .round_trip("output", self.transport.output(self.id))
            .await?;
        self.state.output = output;
        Ok(&self.state.output)
    }

    /// Pull frames, heap and output.
    pub async fn refresh(&mut self) -> Result<()> {
        self.get_frames().await?;
        self.get_memory().await?;
        self.get_output().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(session = self.id))]
    pub async fn control(&mut self, control: ExecControl) -> Result<Vec<Record>> {
        let reply = self.command(control.command()).await?;
        if control == ExecControl::Restart {
            self.state.output.clear();
        }
        // A single step can change every part of the state, and nothing is pushed.
        self.refresh().await?;
        self.update_state(&reply.records);
        Ok(reply.records)
    }

    pub async fn step(&mut self) -> Result<Vec<Record>> {
        self.control(ExecControl::StepInto).await
    }

    pub async fn next(&mut self) -> Result<Vec<Record>> {
        self.control(ExecControl::StepOver).await
    }

    pub async fn restart(&mut self) -> Result<Vec<Record>> {
        self.control(ExecControl::Restart).await
    }

    /// Let the backend step and take its whole state snapshot.
    pub async fn step_on_server(&mut self) -> Result<&ProgramState> {
        let mut snapshot = self
            .round_trip("step", self.transport.step(self.id))
            .await?;
        snapshot.frames = index_by_level(std::mem::take(&mut snapshot.frames))?;
        // The backend stores evaluated `&name` text, e.g. "(int *) 0x7ffe...".
        for variable in snapshot.frames.iter_mut().flat_map(|f| f.variables.iter_mut()) {
            variable.address = variable
                .address
                .as_deref()
                .and_then(hex_literal)
                .map(str::to_string);
        }
        self.state = snapshot;
        Ok(&self.state)
    }

    /// Back to editing: forget the loaded program.
    pub fn edit(&mut self) {
        self.state.reset_for_edit();
        debug_assert_eq!(self.state.exec_state, ExecState::Edit);
    }

    /// Best-effort teardown. The returned handle may be awaited but need not be.
    pub fn close(mut self) -> Option<JoinHandle<()>> {
        self.notify_close()
    }

    fn notify_close(&mut self) -> Option<JoinHandle<()>> {
        if self.closed {
            return None;
        }
        self.closed = true;

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(session = self.id, "no runtime, skipping close notification");
                return None;
            }
        };

        let transport = Arc::clone(&self.transport);
        let id = self.id;
        let limit = self.options.close_timeout;
        Some(handle.spawn(async move {
            match tokio::time::timeout(limit, transport.close(id)).await {
                Ok(Ok(())) => tracing::info!(session = id, "debugger session closed"),
                Ok(Err(e)) => tracing::warn!(session = id, error = %e, "close failed"),
                Err(_) => tracing::warn!(session = id, ?limit, "close timed out"),
            }
        }))
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        let _ = self.notify_close();
    }
}
