//! Client-side bridge to a GDB/MI debugger running behind an HTTP backend.
//!
//! A [`Session`] owns one backend debugger instance. It issues tokened MI commands
//! through a [`Transport`], folds the returned records into a [`ProgramState`] and
//! rebuilds frames, heap and output after every execution-control operation.

pub mod config;
pub mod debugger;
pub mod error;
pub mod protocol;
pub mod repl;
pub mod transport;

pub use config::BridgeConfig;
pub use debugger::{ExecState, ProgramState, Session, SessionOptions};
pub use error::{BridgeError, Result};
pub use transport::{HttpTransport, Transport};
