pub mod agg;
pub mod engine;
pub mod error;
pub mod event;
pub mod router;
pub mod window;

pub use engine::{Engine, EngineStats, PublishReport};
pub use event::{Event, Value};
pub use router::{EventRouter, ResultRecord, SinkHandler};
