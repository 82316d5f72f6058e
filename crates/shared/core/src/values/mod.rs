mod id;
mod intents;

pub use id::Id;
pub use intents::Intents;

/// Sequence number of a gateway dispatch
pub type Sequence = u64;
