use std::fmt;

/// Discriminant of [`super::Event`], used for routing subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Resumed,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MemberAdd,
    MemberUpdate,
    MemberRemove,
    MembersChunk,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    UserUpdate,
    MessageCreate,
    /// Any dispatch without a typed payload
    Unknown,
}

impl EventKind {
    /// Dispatch name (`t` field) for typed kinds
    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::MemberAdd => "GUILD_MEMBER_ADD",
            Self::MemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::MemberRemove => "GUILD_MEMBER_REMOVE",
            Self::MembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::RoleCreate => "GUILD_ROLE_CREATE",
            Self::RoleUpdate => "GUILD_ROLE_UPDATE",
            Self::RoleDelete => "GUILD_ROLE_DELETE",
            Self::UserUpdate => "USER_UPDATE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::Unknown => return None,
        })
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "READY" => Self::Ready,
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate,
            "GUILD_UPDATE" => Self::GuildUpdate,
            "GUILD_DELETE" => Self::GuildDelete,
            "CHANNEL_CREATE" => Self::ChannelCreate,
            "CHANNEL_UPDATE" => Self::ChannelUpdate,
            "CHANNEL_DELETE" => Self::ChannelDelete,
            "GUILD_MEMBER_ADD" => Self::MemberAdd,
            "GUILD_MEMBER_UPDATE" => Self::MemberUpdate,
            "GUILD_MEMBER_REMOVE" => Self::MemberRemove,
            "GUILD_MEMBERS_CHUNK" => Self::MembersChunk,
            "GUILD_ROLE_CREATE" => Self::RoleCreate,
            "GUILD_ROLE_UPDATE" => Self::RoleUpdate,
            "GUILD_ROLE_DELETE" => Self::RoleDelete,
            "USER_UPDATE" => Self::UserUpdate,
            "MESSAGE_CREATE" => Self::MessageCreate,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("UNKNOWN"))
    }
}
