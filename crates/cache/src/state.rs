use concord_core::{
    Channel, Event, Guild, GuildCreate, Id, Member, MemberUpdate, Role, User,
};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::arena::Arena;
use crate::cow::CowMap;
use crate::entity::{CachedEntity, CachedMember, EntityKey};

#[derive(Debug, Clone, Default, PartialEq)]
struct GuildChildren {
    channels: BTreeSet<Id>,
    roles: BTreeSet<Id>,
    /// User ids; the member key is `(guild_id, user_id)`
    members: CowMap<Id, ()>,
}

impl GuildChildren {
    fn member_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.members.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// One immutable version of the cache.
///
/// Readers hold an `Arc<CacheState>` and never observe a partially applied
/// event. Every store is reference counted: guilds own their channels, roles
/// and members; members own their user, which is stored once however many
/// guilds it belongs to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheState {
    guilds: Arena<Id, Guild>,
    channels: Arena<Id, Channel>,
    roles: Arena<Id, Role>,
    users: Arena<Id, User>,
    members: Arena<(Id, Id), CachedMember>,
    children: CowMap<Id, Arc<GuildChildren>>,
    role_guild: CowMap<Id, Id>,
    current_user: Option<Id>,
}

// =========================================================================
// Reads
// =========================================================================

impl CacheState {
    pub fn guild(&self, id: Id) -> Option<Arc<Guild>> {
        self.guilds.get(&id)
    }

    pub fn channel(&self, id: Id) -> Option<Arc<Channel>> {
        self.channels.get(&id)
    }

    pub fn role(&self, id: Id) -> Option<Arc<Role>> {
        self.roles.get(&id)
    }

    pub fn user(&self, id: Id) -> Option<Arc<User>> {
        self.users.get(&id)
    }

    pub fn member(&self, guild_id: Id, user_id: Id) -> Option<Arc<CachedMember>> {
        self.members.get(&(guild_id, user_id))
    }

    /// The client's own user, set by READY
    pub fn current_user(&self) -> Option<Arc<User>> {
        self.current_user.and_then(|id| self.users.get(&id))
    }

    pub fn get(&self, key: EntityKey) -> Option<CachedEntity> {
        match key {
            EntityKey::Guild(id) => self.guild(id).map(CachedEntity::Guild),
            EntityKey::Channel(id) => self.channel(id).map(CachedEntity::Channel),
            EntityKey::Role(id) => self.role(id).map(CachedEntity::Role),
            EntityKey::User(id) => self.user(id).map(CachedEntity::User),
            EntityKey::Member { guild_id, user_id } => {
                self.member(guild_id, user_id).map(CachedEntity::Member)
            }
        }
    }

    /// Entities owned by a guild: channels, then roles, then members
    pub fn children_of(&self, parent: Id) -> Vec<EntityKey> {
        let Some(children) = self.children.get(&parent) else {
            return Vec::new();
        };
        children
            .channels
            .iter()
            .map(|id| EntityKey::Channel(*id))
            .chain(children.roles.iter().map(|id| EntityKey::Role(*id)))
            .chain(children.member_ids().into_iter().map(|user_id| EntityKey::Member {
                guild_id: parent,
                user_id,
            }))
            .collect()
    }

    pub fn guild_channels(&self, guild_id: Id) -> Vec<Arc<Channel>> {
        self.children
            .get(&guild_id)
            .map(|c| c.channels.iter().filter_map(|id| self.channels.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn guild_roles(&self, guild_id: Id) -> Vec<Arc<Role>> {
        self.children
            .get(&guild_id)
            .map(|c| c.roles.iter().filter_map(|id| self.roles.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn guild_members(&self, guild_id: Id) -> Vec<Arc<CachedMember>> {
        self.children
            .get(&guild_id)
            .map(|c| {
                c.member_ids()
                    .into_iter()
                    .filter_map(|uid| self.members.get(&(guild_id, uid)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of owning relationships held on an entry
    pub fn owner_count(&self, key: EntityKey) -> u32 {
        match key {
            EntityKey::Guild(id) => self.guilds.refs(&id),
            EntityKey::Channel(id) => self.channels.refs(&id),
            EntityKey::Role(id) => self.roles.refs(&id),
            EntityKey::User(id) => self.users.refs(&id),
            EntityKey::Member { guild_id, user_id } => self.members.refs(&(guild_id, user_id)),
        }
    }

    pub fn guilds(&self) -> impl Iterator<Item = &Arc<Guild>> {
        self.guilds.values()
    }

    pub(crate) fn counts(&self) -> [usize; 6] {
        [
            self.guilds.len(),
            self.channels.len(),
            self.roles.len(),
            self.users.len(),
            self.members.len(),
            self.users.pinned_count(),
        ]
    }
}

// =========================================================================
// Writes
// =========================================================================

impl CacheState {
    fn children_mut(&mut self, guild_id: Id) -> &mut GuildChildren {
        Arc::make_mut(self.children.get_or_insert_with(guild_id, Default::default))
    }

    pub(crate) fn upsert_guild(&mut self, guild: Guild) -> bool {
        let id = guild.id;
        if self.guilds.upsert(id, guild) {
            self.guilds.retain(&id);
            self.children_mut(id);
        }
        true
    }

    /// Full guild payload: replaces the guild and its children
    pub(crate) fn replace_guild(&mut self, create: &GuildCreate) -> bool {
        let id = create.guild.id;
        self.unlink_children(id);
        self.upsert_guild(create.guild.clone());
        for channel in &create.channels {
            let mut channel = channel.clone();
            channel.guild_id = Some(id);
            self.upsert_channel(channel);
        }
        for role in &create.roles {
            self.upsert_role(id, role.clone());
        }
        for member in &create.members {
            self.upsert_member(id, member);
        }
        true
    }

    fn unlink_children(&mut self, guild_id: Id) {
        let Some(children) = self.children.remove(&guild_id) else {
            return;
        };
        for id in &children.channels {
            self.channels.release(id);
        }
        for id in &children.roles {
            self.roles.release(id);
            self.role_guild.remove(id);
        }
        for user_id in children.members.keys() {
            self.members.release(&(guild_id, *user_id));
            self.users.release(user_id);
        }
    }

    pub(crate) fn remove_guild(&mut self, id: Id) -> bool {
        if !self.guilds.contains(&id) && !self.children.contains_key(&id) {
            return false;
        }
        self.unlink_children(id);
        self.guilds.release(&id);
        true
    }

    /// Outage: keep the guild, flagged unavailable
    pub(crate) fn mark_unavailable(&mut self, id: Id) -> bool {
        if !self.guilds.modify(&id, |g| g.unavailable = true) {
            self.upsert_guild(Guild::unavailable(id));
        }
        true
    }

    pub(crate) fn update_guild(&mut self, guild: &Guild) -> bool {
        let updated = self.guilds.modify(&guild.id, |cached| {
            let member_count = cached.member_count;
            *cached = guild.clone();
            cached.member_count = guild.member_count.or(member_count);
        });
        if !updated {
            self.upsert_guild(guild.clone());
        }
        true
    }

    pub(crate) fn upsert_channel(&mut self, channel: Channel) -> bool {
        let id = channel.id;
        let guild_id = channel.guild_id;
        if self.channels.upsert(id, channel) {
            self.channels.retain(&id);
            if let Some(guild_id) = guild_id {
                self.children_mut(guild_id).channels.insert(id);
            }
        }
        true
    }

    pub(crate) fn remove_channel(&mut self, id: Id) -> bool {
        let Some(channel) = self.channels.get(&id) else {
            return false;
        };
        if let Some(guild_id) = channel.guild_id {
            self.children_mut(guild_id).channels.remove(&id);
        }
        self.channels.release(&id);
        true
    }

    pub(crate) fn upsert_role(&mut self, guild_id: Id, role: Role) -> bool {
        let id = role.id;
        if self.roles.upsert(id, role) {
            self.roles.retain(&id);
            self.children_mut(guild_id).roles.insert(id);
            self.role_guild.insert(id, guild_id);
        }
        true
    }

    pub(crate) fn remove_role(&mut self, id: Id) -> bool {
        if !self.roles.contains(&id) {
            return false;
        }
        if let Some(guild_id) = self.role_guild.remove(&id) {
            self.children_mut(guild_id).roles.remove(&id);
        }
        self.roles.release(&id);
        true
    }

    pub(crate) fn upsert_member(&mut self, guild_id: Id, member: &Member) -> bool {
        let user_id = member.user.id;
        self.users.upsert(user_id, member.user.clone());
        let key = (guild_id, user_id);
        if self
            .members
            .upsert(key, CachedMember::from_member(guild_id, member))
        {
            self.members.retain(&key);
            self.users.retain(&user_id);
            self.children_mut(guild_id).members.insert(user_id, ());
        }
        true
    }

    pub(crate) fn update_member(&mut self, update: &MemberUpdate) -> bool {
        let key = (update.guild_id, update.user.id);
        if !self.members.contains(&key) {
            let member = Member {
                user: update.user.clone(),
                nick: update.nick.clone(),
                roles: update.roles.clone().unwrap_or_default(),
                joined_at: update.joined_at.clone(),
                deaf: false,
                mute: false,
            };
            return self.upsert_member(update.guild_id, &member);
        }
        self.users.upsert(update.user.id, update.user.clone());
        self.members.modify(&key, |cached| {
            cached.nick = update.nick.clone();
            if let Some(roles) = &update.roles {
                cached.roles = roles.clone();
            }
            if update.joined_at.is_some() {
                cached.joined_at = update.joined_at.clone();
            }
        });
        true
    }

    pub(crate) fn remove_member(&mut self, guild_id: Id, user_id: Id) -> bool {
        let key = (guild_id, user_id);
        if !self.members.contains(&key) {
            return false;
        }
        self.members.release(&key);
        self.children_mut(guild_id).members.remove(&user_id);
        self.users.release(&user_id);
        true
    }

    pub(crate) fn upsert_user(&mut self, user: User) -> bool {
        self.users.upsert(user.id, user);
        true
    }

    /// Drop a user nobody references
    pub(crate) fn remove_user(&mut self, id: Id) -> bool {
        self.users.remove_unowned(&id)
    }

    pub(crate) fn set_current_user(&mut self, user: User) -> bool {
        let id = user.id;
        if let Some(previous) = self.current_user.filter(|prev| *prev != id) {
            self.users.set_pinned(&previous, false);
        }
        self.users.upsert(id, user);
        self.users.set_pinned(&id, true);
        self.current_user = Some(id);
        true
    }

    fn adjust_member_count(&mut self, guild_id: Id, delta: i64) {
        self.guilds.modify(&guild_id, |g| {
            if let Some(count) = g.member_count.as_mut() {
                *count = count.saturating_add_signed(delta);
            }
        });
    }

    /// Apply one dispatch. Returns whether the cache changed.
    pub(crate) fn apply_event(&mut self, event: &Event) -> bool {
        match event {
            Event::Ready(ready) => {
                self.set_current_user(ready.user.clone());
                for guild in &ready.guilds {
                    if !self.guilds.contains(&guild.id) {
                        self.upsert_guild(Guild::unavailable(guild.id));
                    }
                }
                true
            }
            Event::GuildCreate(create) => self.replace_guild(create),
            Event::GuildUpdate(guild) => self.update_guild(guild),
            Event::GuildDelete(deleted) if deleted.unavailable => self.mark_unavailable(deleted.id),
            Event::GuildDelete(deleted) => self.remove_guild(deleted.id),
            Event::ChannelCreate(channel) | Event::ChannelUpdate(channel) => {
                self.upsert_channel(Channel::clone(channel))
            }
            Event::ChannelDelete(channel) => self.remove_channel(channel.id),
            Event::MemberAdd(add) => {
                let added = !self.members.contains(&(add.guild_id, add.member.user.id));
                self.upsert_member(add.guild_id, &add.member);
                if added {
                    self.adjust_member_count(add.guild_id, 1);
                }
                true
            }
            Event::MemberUpdate(update) => self.update_member(update),
            Event::MemberRemove(remove) => {
                let removed = self.remove_member(remove.guild_id, remove.user.id);
                if removed {
                    self.adjust_member_count(remove.guild_id, -1);
                }
                removed
            }
            Event::MembersChunk(chunk) => {
                for member in &chunk.members {
                    self.upsert_member(chunk.guild_id, member);
                }
                !chunk.members.is_empty()
            }
            Event::RoleCreate(ev) | Event::RoleUpdate(ev) => {
                self.upsert_role(ev.guild_id, ev.role.clone())
            }
            Event::RoleDelete(ev) => self.remove_role(ev.role_id),
            Event::UserUpdate(user) => {
                if self.current_user == Some(user.id) || self.users.contains(&user.id) {
                    self.upsert_user(User::clone(user))
                } else {
                    false
                }
            }
            Event::Resumed | Event::MessageCreate(_) | Event::Unknown { .. } => false,
        }
    }
}
