use concord_core::{Channel, Guild, Id, Member, Role, User};
use std::sync::Arc;

/// Guild membership as stored: the user lives in the shared user store.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMember {
    pub guild_id: Id,
    pub user_id: Id,
    pub nick: Option<String>,
    pub roles: Vec<Id>,
    pub joined_at: Option<String>,
}

impl CachedMember {
    pub fn from_member(guild_id: Id, member: &Member) -> Self {
        Self {
            guild_id,
            user_id: member.user.id,
            nick: member.nick.clone(),
            roles: member.roles.clone(),
            joined_at: member.joined_at.clone(),
        }
    }
}

/// Something that can be written to the cache
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Guild(Guild),
    /// Guild channels are linked to the guild named by `guild_id`
    Channel(Channel),
    Role { guild_id: Id, role: Role },
    User(User),
    Member { guild_id: Id, member: Member },
}

/// Address of a cached entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Guild(Id),
    Channel(Id),
    Role(Id),
    User(Id),
    Member { guild_id: Id, user_id: Id },
}

/// A cached entity as read back
#[derive(Debug, Clone, PartialEq)]
pub enum CachedEntity {
    Guild(Arc<Guild>),
    Channel(Arc<Channel>),
    Role(Arc<Role>),
    User(Arc<User>),
    Member(Arc<CachedMember>),
}

impl Entity {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Guild(g) => EntityKey::Guild(g.id),
            Self::Channel(c) => EntityKey::Channel(c.id),
            Self::Role { role, .. } => EntityKey::Role(role.id),
            Self::User(u) => EntityKey::User(u.id),
            Self::Member { guild_id, member } => EntityKey::Member {
                guild_id: *guild_id,
                user_id: member.user.id,
            },
        }
    }
}
