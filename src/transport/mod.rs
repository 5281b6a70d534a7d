//! Request/response access to the debugger backend.
//!
//! The backend runs one debugger process per session and answers over HTTP; see
//! [`http::HttpTransport`]. Implementations only move bytes and decode them. Ordering,
//! tokens, timeouts and state live in [`crate::debugger::Session`].

pub mod http;

use std::future::Future;

use crate::debugger::{Allocation, ProgramState};
use crate::error::Result;
use crate::protocol::Record;

pub use http::HttpTransport;

/// Backend-issued identifier of one debugger instance.
pub type SessionId = u64;

/// Answer of the variable-location endpoint: the records produced by evaluating
/// `&name` and `sizeof(name)` in the requested frame.
#[derive(Debug, Clone, Default)]
pub struct VariableLocation {
    pub address: Vec<Record>,
    pub size: Vec<Record>,
}

pub trait Transport: Send + Sync + 'static {
    /// Ask the backend for a new debugger instance.
    fn start(&self) -> impl Future<Output = Result<SessionId>> + Send;

    /// Upload source, compile it, break in `main` and run.
    fn load_and_run(
        &self,
        session: SessionId,
        source: &str,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Send one literal command line.
    fn command(
        &self,
        session: SessionId,
        text: &str,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Everything the debuggee has written to standard output so far.
    fn output(&self, session: SessionId) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Live heap allocations of the debuggee.
    fn memory(&self, session: SessionId) -> impl Future<Output = Result<Vec<Allocation>>> + Send;

    fn variable(
        &self,
        session: SessionId,
        frame: u32,
        name: &str,
    ) -> impl Future<Output = Result<VariableLocation>> + Send;

    /// Let the backend step and rebuild the whole program state itself.
    fn step(&self, session: SessionId) -> impl Future<Output = Result<ProgramState>> + Send;

    /// Tell the backend to tear the instance down. Callers do not wait on this.
    fn close(&self, session: SessionId) -> impl Future<Output = Result<()>> + Send;
}
