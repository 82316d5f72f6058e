use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{Member, Role, UnavailableGuild, User};
use crate::values::Id;

/// First dispatch of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    /// `[shard_id, shard_count]`
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAdd {
    pub guild_id: Id,
    #[serde(flatten)]
    pub member: Member,
}

/// Partial member update; absent fields keep their cached values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberUpdate {
    pub guild_id: Id,
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<Id>>,
    #[serde(default)]
    pub joined_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRemove {
    pub guild_id: Id,
    pub user: User,
}

/// Response to REQUEST_GUILD_MEMBERS, delivered in `chunk_count` parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembersChunk {
    pub guild_id: Id,
    #[serde(default)]
    pub members: Vec<Member>,
    pub chunk_index: u32,
    pub chunk_count: u32,
    /// Ids requested that do not exist in the guild
    #[serde(default)]
    pub not_found: Vec<Value>,
    #[serde(default)]
    pub nonce: Option<String>,
}

impl MembersChunk {
    pub fn is_last(&self) -> bool {
        self.chunk_index + 1 >= self.chunk_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleEvent {
    pub guild_id: Id,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDelete {
    pub guild_id: Id,
    pub role_id: Id,
}
