//! Decoded dispatch events.
//!
//! A representative subset of dispatches is typed; every other dispatch name
//! is carried through as [`Event::Unknown`] with its raw JSON payload.

mod kind;
mod payloads;

pub use kind::EventKind;
pub use payloads::{
    MemberAdd, MemberRemove, MemberUpdate, MembersChunk, Ready, RoleDelete, RoleEvent,
};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::entities::{Channel, Guild, GuildCreate, Message, UnavailableGuild, User};
use crate::values::Id;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Ready(Box<Ready>),
    Resumed,
    GuildCreate(Box<GuildCreate>),
    GuildUpdate(Box<Guild>),
    GuildDelete(UnavailableGuild),
    ChannelCreate(Box<Channel>),
    ChannelUpdate(Box<Channel>),
    ChannelDelete(Box<Channel>),
    MemberAdd(Box<MemberAdd>),
    MemberUpdate(Box<MemberUpdate>),
    MemberRemove(Box<MemberRemove>),
    MembersChunk(Box<MembersChunk>),
    RoleCreate(Box<RoleEvent>),
    RoleUpdate(Box<RoleEvent>),
    RoleDelete(RoleDelete),
    UserUpdate(Box<User>),
    MessageCreate(Box<Message>),
    Unknown { name: String, data: Value },
}

fn decode<T: DeserializeOwned>(data: &Value) -> Result<Box<T>, serde_json::Error> {
    T::deserialize(data).map(Box::new)
}

impl Event {
    /// Decode a dispatch by its `t` name.
    ///
    /// Unrecognized names never fail; a recognized name with a malformed
    /// payload returns the decode error.
    pub fn from_dispatch(name: &str, data: &Value) -> Result<Self, serde_json::Error> {
        let event = match EventKind::from_name(name) {
            EventKind::Ready => Self::Ready(decode(data)?),
            EventKind::Resumed => Self::Resumed,
            EventKind::GuildCreate => Self::GuildCreate(decode(data)?),
            EventKind::GuildUpdate => Self::GuildUpdate(decode(data)?),
            EventKind::GuildDelete => Self::GuildDelete(UnavailableGuild::deserialize(data)?),
            EventKind::ChannelCreate => Self::ChannelCreate(decode(data)?),
            EventKind::ChannelUpdate => Self::ChannelUpdate(decode(data)?),
            EventKind::ChannelDelete => Self::ChannelDelete(decode(data)?),
            EventKind::MemberAdd => Self::MemberAdd(decode(data)?),
            EventKind::MemberUpdate => Self::MemberUpdate(decode(data)?),
            EventKind::MemberRemove => Self::MemberRemove(decode(data)?),
            EventKind::MembersChunk => Self::MembersChunk(decode(data)?),
            EventKind::RoleCreate => Self::RoleCreate(decode(data)?),
            EventKind::RoleUpdate => Self::RoleUpdate(decode(data)?),
            EventKind::RoleDelete => Self::RoleDelete(RoleDelete::deserialize(data)?),
            EventKind::UserUpdate => Self::UserUpdate(decode(data)?),
            EventKind::MessageCreate => Self::MessageCreate(decode(data)?),
            EventKind::Unknown => Self::Unknown {
                name: name.to_string(),
                data: data.clone(),
            },
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready(_) => EventKind::Ready,
            Self::Resumed => EventKind::Resumed,
            Self::GuildCreate(_) => EventKind::GuildCreate,
            Self::GuildUpdate(_) => EventKind::GuildUpdate,
            Self::GuildDelete(_) => EventKind::GuildDelete,
            Self::ChannelCreate(_) => EventKind::ChannelCreate,
            Self::ChannelUpdate(_) => EventKind::ChannelUpdate,
            Self::ChannelDelete(_) => EventKind::ChannelDelete,
            Self::MemberAdd(_) => EventKind::MemberAdd,
            Self::MemberUpdate(_) => EventKind::MemberUpdate,
            Self::MemberRemove(_) => EventKind::MemberRemove,
            Self::MembersChunk(_) => EventKind::MembersChunk,
            Self::RoleCreate(_) => EventKind::RoleCreate,
            Self::RoleUpdate(_) => EventKind::RoleUpdate,
            Self::RoleDelete(_) => EventKind::RoleDelete,
            Self::UserUpdate(_) => EventKind::UserUpdate,
            Self::MessageCreate(_) => EventKind::MessageCreate,
            Self::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// Dispatch name as received
    pub fn name(&self) -> &str {
        match self {
            Self::Unknown { name, .. } => name,
            other => other.kind().name().unwrap_or("UNKNOWN"),
        }
    }

    /// Guild the event belongs to, when it has one
    pub fn guild_id(&self) -> Option<Id> {
        match self {
            Self::GuildCreate(g) => Some(g.guild.id),
            Self::GuildUpdate(g) => Some(g.id),
            Self::GuildDelete(g) => Some(g.id),
            Self::ChannelCreate(c) | Self::ChannelUpdate(c) | Self::ChannelDelete(c) => c.guild_id,
            Self::MemberAdd(m) => Some(m.guild_id),
            Self::MemberUpdate(m) => Some(m.guild_id),
            Self::MemberRemove(m) => Some(m.guild_id),
            Self::MembersChunk(m) => Some(m.guild_id),
            Self::RoleCreate(r) | Self::RoleUpdate(r) => Some(r.guild_id),
            Self::RoleDelete(r) => Some(r.guild_id),
            Self::MessageCreate(m) => m.guild_id,
            Self::Unknown { data, .. } => data
                .get("guild_id")
                .and_then(|v| Id::deserialize(v).ok()),
            Self::Ready(_) | Self::Resumed | Self::UserUpdate(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ready_decodes() {
        let data = json!({
            "v": 10,
            "user": {"id": "1", "username": "bot", "bot": true},
            "guilds": [{"id": "10", "unavailable": true}],
            "session_id": "abc",
            "resume_gateway_url": "wss://resume.example",
            "shard": [0, 1]
        });
        let event = Event::from_dispatch("READY", &data).unwrap();
        let Event::Ready(ready) = event else {
            panic!("expected READY");
        };
        assert_eq!(ready.session_id, "abc");
        assert_eq!(ready.guilds.len(), 1);
        assert_eq!(ready.shard, Some([0, 1]));
    }

    #[test]
    fn test_unknown_name_is_catch_all() {
        let data = json!({"guild_id": "7", "emoji": "x"});
        let event = Event::from_dispatch("MESSAGE_REACTION_ADD", &data).unwrap();
        assert_eq!(event.kind(), EventKind::Unknown);
        assert_eq!(event.name(), "MESSAGE_REACTION_ADD");
        assert_eq!(event.guild_id(), Some(Id::new(7)));
    }

    #[test]
    fn test_malformed_known_event_is_error() {
        let data = json!({"id": "1"});
        assert!(Event::from_dispatch("MESSAGE_CREATE", &data).is_err());
    }

    #[test]
    fn test_member_add_flattens_member() {
        let data = json!({
            "guild_id": "10",
            "user": {"id": "2", "username": "crab"},
            "nick": "c",
            "roles": ["11"]
        });
        let Event::MemberAdd(add) = Event::from_dispatch("GUILD_MEMBER_ADD", &data).unwrap()
        else {
            panic!("expected GUILD_MEMBER_ADD");
        };
        assert_eq!(add.guild_id, Id::new(10));
        assert_eq!(add.member.user.id, Id::new(2));
        assert_eq!(add.member.roles, vec![Id::new(11)]);
    }

    #[test]
    fn test_kind_name_round_trip() {
        for kind in [EventKind::Ready, EventKind::MembersChunk, EventKind::RoleDelete] {
            assert_eq!(EventKind::from_name(kind.name().unwrap()), kind);
        }
        assert_eq!(EventKind::Unknown.name(), None);
    }
}
