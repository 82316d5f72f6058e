use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Gateway intents: which event groups a shard subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        const GUILDS = 1 << 0;
        /// Privileged
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_MODERATION = 1 << 2;
        const GUILD_EXPRESSIONS = 1 << 3;
        const GUILD_INTEGRATIONS = 1 << 4;
        const GUILD_WEBHOOKS = 1 << 5;
        const GUILD_INVITES = 1 << 6;
        const GUILD_VOICE_STATES = 1 << 7;
        /// Privileged
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        const GUILD_MESSAGE_TYPING = 1 << 11;
        const DIRECT_MESSAGES = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        /// Privileged
        const MESSAGE_CONTENT = 1 << 15;
        const GUILD_SCHEDULED_EVENTS = 1 << 16;
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        const AUTO_MODERATION_EXECUTION = 1 << 21;
    }
}

impl Intents {
    /// Intents that must be enabled for the application before use
    pub const fn privileged() -> Self {
        Self::GUILD_MEMBERS
            .union(Self::GUILD_PRESENCES)
            .union(Self::MESSAGE_CONTENT)
    }

    pub const fn non_privileged() -> Self {
        Self::all().difference(Self::privileged())
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::non_privileged()
    }
}

// The wire form is the raw bitmask integer.
impl Serialize for Intents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileged_split() {
        let all = Intents::all();
        assert_eq!(Intents::privileged() | Intents::non_privileged(), all);
        assert!(!Intents::non_privileged().contains(Intents::GUILD_MEMBERS));
        assert!(Intents::default().contains(Intents::GUILD_MESSAGES));
    }

    #[test]
    fn test_serializes_as_bitmask() {
        let intents = Intents::GUILDS | Intents::GUILD_MESSAGES;
        assert_eq!(serde_json::to_string(&intents).unwrap(), "513");
        let back: Intents = serde_json::from_str("513").unwrap();
        assert_eq!(back, intents);
    }

    #[test]
    fn test_unknown_bits_are_dropped() {
        let intents: Intents = serde_json::from_str(&((1u64 << 40) | 1).to_string()).unwrap();
        assert_eq!(intents, Intents::GUILDS);
    }
}
