pub mod queue;
pub mod types;

pub use queue::{QueueSnapshot, SenderVolume};
pub use types::{Action, GeoInfo, SenderSignals};
