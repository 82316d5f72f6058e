use concord_cache::{Cache, CachedEntity, Entity, EntityKey};
use concord_core::{Event, Id, Member, User};
use serde_json::{Value, json};

fn event(name: &str, data: Value) -> Event {
    Event::from_dispatch(name, &data).unwrap()
}

fn user_json(id: u64) -> Value {
    json!({"id": id.to_string(), "username": format!("user{id}")})
}

fn guild_create(guild_id: u64, channel_ids: &[u64], member_ids: &[u64]) -> Event {
    let channels: Vec<Value> = channel_ids
        .iter()
        .map(|id| json!({"id": id.to_string(), "type": 0, "name": format!("c{id}")}))
        .collect();
    let members: Vec<Value> = member_ids
        .iter()
        .map(|id| json!({"user": user_json(*id), "roles": []}))
        .collect();
    event(
        "GUILD_CREATE",
        json!({
            "id": guild_id.to_string(),
            "name": format!("guild{guild_id}"),
            "member_count": member_ids.len(),
            "channels": channels,
            "roles": [{"id": guild_id.to_string(), "name": "@everyone", "permissions": "0"}],
            "members": members,
        }),
    )
}

fn member_remove(guild_id: u64, user_id: u64) -> Event {
    event(
        "GUILD_MEMBER_REMOVE",
        json!({"guild_id": guild_id.to_string(), "user": user_json(user_id)}),
    )
}

fn ready(self_id: u64, guilds: &[u64]) -> Event {
    let guilds: Vec<Value> = guilds
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    event(
        "READY",
        json!({"v": 10, "user": user_json(self_id), "guilds": guilds, "session_id": "s"}),
    )
}

// =========================================================================
// Reference counting
// =========================================================================

#[test]
fn test_shared_user_survives_until_last_guild() {
    let cache = Cache::new();
    cache.apply(0, &guild_create(1, &[10], &[100, 101]));
    cache.apply(0, &guild_create(2, &[20], &[100]));

    let snap = cache.snapshot();
    assert_eq!(snap.owner_count(EntityKey::User(Id::new(100))), 2);

    // Removing from a non-last parent keeps the user reachable.
    cache.apply(0, &member_remove(1, 100));
    let snap = cache.snapshot();
    assert!(snap.member(Id::new(1), Id::new(100)).is_none());
    assert!(snap.user(Id::new(100)).is_some());
    assert!(snap.member(Id::new(2), Id::new(100)).is_some());

    // Removing from the last parent evicts it.
    cache.apply(0, &member_remove(2, 100));
    assert!(cache.snapshot().user(Id::new(100)).is_none());
    assert!(cache.snapshot().user(Id::new(101)).is_some());
}

#[test]
fn test_guild_delete_unlinks_children() {
    let cache = Cache::new();
    cache.apply(0, &guild_create(1, &[10, 11], &[100]));
    cache.apply(0, &guild_create(2, &[20], &[100]));
    assert_eq!(cache.children_of(Id::new(1)).len(), 4);

    cache.apply(0, &event("GUILD_DELETE", json!({"id": "1"})));
    let snap = cache.snapshot();
    assert!(snap.guild(Id::new(1)).is_none());
    assert!(snap.channel(Id::new(10)).is_none());
    assert!(snap.role(Id::new(1)).is_none());
    assert!(cache.children_of(Id::new(1)).is_empty());
    // Still a member of guild 2.
    assert_eq!(snap.owner_count(EntityKey::User(Id::new(100))), 1);
}

#[test]
fn test_unavailable_guild_is_kept() {
    let cache = Cache::new();
    cache.apply(0, &guild_create(1, &[10], &[100]));
    cache.apply(0, &event("GUILD_DELETE", json!({"id": "1", "unavailable": true})));

    let snap = cache.snapshot();
    let guild = snap.guild(Id::new(1)).unwrap();
    assert!(guild.unavailable);
    assert!(snap.channel(Id::new(10)).is_some());

    // Coming back replaces the children wholesale.
    cache.apply(0, &guild_create(1, &[12], &[101]));
    let snap = cache.snapshot();
    assert!(!snap.guild(Id::new(1)).unwrap().unavailable);
    assert!(snap.channel(Id::new(10)).is_none());
    assert!(snap.channel(Id::new(12)).is_some());
    assert!(snap.user(Id::new(100)).is_none());
}

#[test]
fn test_self_user_is_pinned() {
    let cache = Cache::new();
    cache.apply(0, &ready(100, &[1]));
    cache.apply(0, &guild_create(1, &[], &[100]));
    cache.apply(0, &member_remove(1, 100));

    let snap = cache.snapshot();
    assert_eq!(snap.current_user().unwrap().id, Id::new(100));
    assert!(snap.user(Id::new(100)).is_some());
    assert_eq!(cache.stats().pinned, 1);
    assert!(!cache.remove(EntityKey::User(Id::new(100))));
}

#[test]
fn test_ready_registers_unavailable_guilds() {
    let cache = Cache::new();
    cache.apply(0, &ready(5, &[1, 2]));
    let snap = cache.snapshot();
    assert!(snap.guild(Id::new(1)).unwrap().unavailable);
    assert_eq!(snap.guilds().count(), 2);
}

// =========================================================================
// Generic API
// =========================================================================

#[test]
fn test_upsert_get_remove() {
    let cache = Cache::new();
    let member = Member {
        user: User {
            id: Id::new(7),
            username: "ferris".into(),
            discriminator: None,
            global_name: None,
            avatar: None,
            bot: false,
        },
        nick: Some("crab".into()),
        roles: vec![],
        joined_at: None,
        deaf: false,
        mute: false,
    };
    cache.upsert(Entity::Member {
        guild_id: Id::new(1),
        member,
    });

    let key = EntityKey::Member {
        guild_id: Id::new(1),
        user_id: Id::new(7),
    };
    match cache.get(key) {
        Some(CachedEntity::Member(m)) => assert_eq!(m.nick.as_deref(), Some("crab")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(cache.children_of(Id::new(1)), vec![key]);

    assert!(cache.remove(key));
    assert!(cache.get(key).is_none());
    assert!(cache.get(EntityKey::User(Id::new(7))).is_none());
}

#[test]
fn test_member_update_and_chunk() {
    let cache = Cache::new();
    cache.apply(0, &guild_create(1, &[], &[100]));
    cache.apply(
        0,
        &event(
            "GUILD_MEMBER_UPDATE",
            json!({"guild_id": "1", "user": user_json(100), "nick": "boss", "roles": ["1"]}),
        ),
    );
    let member = cache.snapshot().member(Id::new(1), Id::new(100)).unwrap();
    assert_eq!(member.nick.as_deref(), Some("boss"));
    assert_eq!(member.roles, vec![Id::new(1)]);

    cache.apply(
        0,
        &event(
            "GUILD_MEMBERS_CHUNK",
            json!({
                "guild_id": "1",
                "members": [{"user": user_json(200)}, {"user": user_json(201)}],
                "chunk_index": 0,
                "chunk_count": 1
            }),
        ),
    );
    assert_eq!(cache.snapshot().guild_members(Id::new(1)).len(), 3);
}

#[test]
fn test_member_count_follows_add_and_remove() {
    let cache = Cache::new();
    cache.apply(0, &guild_create(1, &[], &[100]));
    cache.apply(
        0,
        &event("GUILD_MEMBER_ADD", json!({"guild_id": "1", "user": user_json(101)})),
    );
    assert_eq!(cache.snapshot().guild(Id::new(1)).unwrap().member_count, Some(2));
    cache.apply(0, &member_remove(1, 100));
    assert_eq!(cache.snapshot().guild(Id::new(1)).unwrap().member_count, Some(1));
}

#[test]
fn test_role_lifecycle() {
    let cache = Cache::new();
    cache.apply(0, &guild_create(1, &[], &[]));
    cache.apply(
        0,
        &event(
            "GUILD_ROLE_CREATE",
            json!({"guild_id": "1", "role": {"id": "50", "name": "mods", "permissions": "8"}}),
        ),
    );
    assert_eq!(cache.snapshot().guild_roles(Id::new(1)).len(), 2);
    cache.apply(0, &event("GUILD_ROLE_DELETE", json!({"guild_id": "1", "role_id": "50"})));
    assert!(cache.snapshot().role(Id::new(50)).is_none());
    assert_eq!(cache.snapshot().guild_roles(Id::new(1)).len(), 1);
}

// =========================================================================
// Snapshots and ordering
// =========================================================================

#[test]
fn test_snapshot_is_immutable() {
    let cache = Cache::new();
    cache.apply(0, &guild_create(1, &[10], &[100]));
    let before = cache.snapshot();
    cache.apply(0, &event("CHANNEL_DELETE", json!({"id": "10", "type": 0, "guild_id": "1"})));

    assert!(before.channel(Id::new(10)).is_some());
    assert!(cache.snapshot().channel(Id::new(10)).is_none());
}

#[test]
fn test_interleaving_of_disjoint_shards_does_not_matter() {
    let shard_a = vec![
        guild_create(1, &[10], &[100, 101]),
        member_remove(1, 101),
        event("CHANNEL_CREATE", json!({"id": "11", "type": 0, "guild_id": "1"})),
    ];
    let shard_b = vec![
        guild_create(2, &[20], &[200]),
        event("GUILD_MEMBER_ADD", json!({"guild_id": "2", "user": user_json(201)})),
        event("CHANNEL_DELETE", json!({"id": "20", "type": 0, "guild_id": "2"})),
    ];

    let sequential = Cache::new();
    for e in &shard_a {
        sequential.apply(0, e);
    }
    for e in &shard_b {
        sequential.apply(1, e);
    }

    let interleaved = Cache::new();
    for (a, b) in shard_a.iter().zip(&shard_b) {
        interleaved.apply(1, b);
        interleaved.apply(0, a);
    }

    assert_eq!(*sequential.snapshot(), *interleaved.snapshot());
    let stats = interleaved.stats();
    assert_eq!(stats.events_applied, 6);
    assert_eq!(stats.per_shard.get(&0), Some(&3));
}

#[test]
fn test_concurrent_readers_see_whole_events() {
    let cache = Cache::new();
    let reader = {
        let cache = cache.clone();
        std::thread::spawn(move || {
            for _ in 0..1000 {
                let snap = cache.snapshot();
                // A guild is never visible without its channel, or vice versa.
                assert_eq!(
                    snap.guild(Id::new(1)).is_some(),
                    snap.channel(Id::new(10)).is_some()
                );
            }
        })
    };
    for _ in 0..200 {
        cache.apply(0, &guild_create(1, &[10], &[]));
        cache.apply(0, &event("GUILD_DELETE", json!({"id": "1"})));
    }
    reader.join().unwrap();
}
