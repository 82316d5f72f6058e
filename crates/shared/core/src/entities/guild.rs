use serde::{Deserialize, Serialize};

use super::{Channel, Member, Role};
use crate::values::Id;

/// Guild fields that are cached on their own; children live in separate
/// cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<Id>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub member_count: Option<u64>,
    /// Set while the guild is affected by a server outage
    #[serde(default)]
    pub unavailable: bool,
}

impl Guild {
    /// Placeholder for a guild known only by id (READY lists, outages)
    pub fn unavailable(id: Id) -> Self {
        Self {
            id,
            name: String::new(),
            owner_id: None,
            icon: None,
            member_count: None,
            unavailable: true,
        }
    }
}

/// Guild entry as sent in READY and GUILD_DELETE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Id,
    /// Absent or false on GUILD_DELETE means the client was removed
    #[serde(default)]
    pub unavailable: bool,
}

/// Full guild sent on GUILD_CREATE: the guild plus its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildCreate {
    #[serde(flatten)]
    pub guild: Guild,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_create_splits_children() {
        let json = r#"{
            "id": "10", "name": "rustaceans", "owner_id": "1", "member_count": 2,
            "channels": [{"id": "20", "type": 0, "name": "general"}],
            "roles": [{"id": "10", "name": "@everyone", "permissions": "0"}],
            "members": [{"user": {"id": "1", "username": "ferris"}, "roles": []}]
        }"#;
        let create: GuildCreate = serde_json::from_str(json).unwrap();
        assert_eq!(create.guild.name, "rustaceans");
        assert!(!create.guild.unavailable);
        assert_eq!(create.channels.len(), 1);
        assert_eq!(create.roles[0].name, "@everyone");
        assert_eq!(create.members[0].user.id, Id::new(1));
    }

    #[test]
    fn test_unavailable_guild_defaults() {
        let g: UnavailableGuild = serde_json::from_str(r#"{"id":"5"}"#).unwrap();
        assert!(!g.unavailable);
        let g: UnavailableGuild = serde_json::from_str(r#"{"id":"5","unavailable":true}"#).unwrap();
        assert!(g.unavailable);
    }
}
