mod command;
pub mod payload;
mod record;
mod token;

pub use command::{is_blank, split_token, MiCommand, ValuesMode};
pub use record::{
    correlate, decode_records, RawRecord, Record, RecordClass, RecordKind, StopReason,
};
pub use token::TokenGenerator;
