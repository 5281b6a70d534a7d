mod frames;
mod reconcile;
mod session;
mod state;
mod stepping;

pub use frames::{index_by_level, merge_variables};
pub use reconcile::update_state;
pub use session::{Reply, Session, SessionOptions, VariableLookup};
pub use state::{
    Allocation, ExecState, Frame, FrameInfo, HeapBounds, ProgramState, Variable, MIN_ADDRESS_SPAN,
};
pub use stepping::ExecControl;
