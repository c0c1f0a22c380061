mod tumbling;

pub use tumbling::{ClosedWindow, EventOutcome, TumblingWindow};
