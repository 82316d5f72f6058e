//! Concord Core Domain
//!
//! Shared kernel for the Concord client runtime: snowflake ids, intents,
//! the cached entity models and the decoded dispatch events.
//! This crate contains no async and no I/O.

pub mod entities;
pub mod error;
pub mod events;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, Guild, GuildCreate, HasId, Member, Message, Role, UnavailableGuild, User,
};
pub use error::{Classified, ErrorClass};
pub use events::{
    Event, EventKind, MemberAdd, MemberRemove, MemberUpdate, MembersChunk, Ready, RoleDelete,
    RoleEvent,
};
pub use values::{Id, Intents, Sequence};
