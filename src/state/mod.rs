//! The network state store (spec §4.4).
//!
//! Holds the current published snapshot of the network (self user, every
//! known user and channel, negotiated capabilities) behind an atomic
//! reference swap: [`StateStore::read`] clones the `Arc` for a stable view,
//! `update_*` builds a new [`NetworkInfo`] from the current one and swaps it
//! in. Snapshots are immutable once published — every mutation produces a
//! new one rather than mutating shared records in place.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::casemap::CaseMapping;
use crate::error::StateError;
use crate::isupport::{ChanModes, Isupport, PrefixSpec};
use crate::prefix::Prefix;

/// Opaque identifier for a user record.
pub type UserId = Uuid;
/// Opaque identifier for a channel record.
pub type ChannelId = Uuid;

/// An immutable user snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub nick: String,
    pub ident: String,
    pub host: String,
    pub account: Option<String>,
    pub away: bool,
    pub realname: String,
    pub modes: BTreeSet<char>,
    /// channel id → status-prefix symbols the user holds there (e.g. `"@+"`, `""`).
    pub channels: HashMap<ChannelId, String>,
}

impl User {
    #[must_use]
    pub fn new(nick: impl Into<String>, ident: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nick: nick.into(),
            ident: ident.into(),
            host: host.into(),
            account: None,
            away: false,
            realname: String::new(),
            modes: BTreeSet::new(),
            channels: HashMap::new(),
        }
    }
}

/// An immutable channel snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub topic: Option<String>,
    /// mode letter → optional parameter (type B/C modes carry one; type D does not).
    pub modes: HashMap<char, Option<String>>,
    /// user id → status-prefix symbols held in this channel.
    pub users: HashMap<UserId, String>,
}

impl Channel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            topic: None,
            modes: HashMap::new(),
            users: HashMap::new(),
        }
    }
}

/// The mode-type classification negotiated via ISUPPORT `CHANMODES`, owned
/// (unlike [`crate::isupport::ChanModes`], which borrows from the raw
/// numeric 005 line).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChanModeTypes {
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
}

impl Default for ChanModeTypes {
    fn default() -> Self {
        let d = ChanModes::DEFAULT;
        Self {
            a: d.a.to_owned(),
            b: d.b.to_owned(),
            c: d.c.to_owned(),
            d: d.d.to_owned(),
        }
    }
}

/// Owned `PREFIX` classification: `modes` and `symbols` are parallel strings
/// (`modes.chars().nth(i)` corresponds to `symbols.chars().nth(i)`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixTypes {
    pub modes: String,
    pub symbols: String,
}

impl Default for PrefixTypes {
    fn default() -> Self {
        let d = PrefixSpec::DEFAULT;
        Self {
            modes: d.modes.to_owned(),
            symbols: d.prefixes.to_owned(),
        }
    }
}

/// The current published snapshot of everything the client knows about the
/// network: who it is, every known user/channel, and negotiated
/// capabilities. Immutable once constructed — [`StateStore`] publishes new
/// instances rather than mutating this one.
#[derive(Clone, Debug)]
pub struct NetworkInfo {
    pub self_id: Option<UserId>,
    pub casemapping: CaseMapping,
    pub chantypes: String,
    pub prefix: PrefixTypes,
    pub chanmodes: ChanModeTypes,
    pub enabled_caps: HashMap<String, Option<String>>,
    pub supported_caps: HashMap<String, Option<String>>,
    users_by_id: HashMap<UserId, Arc<User>>,
    users_by_nick: HashMap<String, UserId>,
    channels_by_id: HashMap<ChannelId, Arc<Channel>>,
    channels_by_name: HashMap<String, ChannelId>,
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self {
            self_id: None,
            casemapping: CaseMapping::default(),
            chantypes: Isupport::DEFAULT_CHANTYPES.to_owned(),
            prefix: PrefixTypes::default(),
            chanmodes: ChanModeTypes::default(),
            enabled_caps: HashMap::new(),
            supported_caps: HashMap::new(),
            users_by_id: HashMap::new(),
            users_by_nick: HashMap::new(),
            channels_by_id: HashMap::new(),
            channels_by_name: HashMap::new(),
        }
    }
}

impl NetworkInfo {
    #[must_use]
    pub fn get_user(&self, id: UserId) -> Option<Arc<User>> {
        self.users_by_id.get(&id).cloned()
    }

    #[must_use]
    pub fn get_user_by_nick(&self, nick: &str) -> Option<Arc<User>> {
        let folded = self.casemapping.to_lower(nick);
        self.users_by_nick
            .get(&folded)
            .and_then(|id| self.users_by_id.get(id))
            .cloned()
    }

    #[must_use]
    pub fn get_channel(&self, id: ChannelId) -> Option<Arc<Channel>> {
        self.channels_by_id.get(&id).cloned()
    }

    #[must_use]
    pub fn get_channel_by_name(&self, name: &str) -> Option<Arc<Channel>> {
        let folded = self.casemapping.to_lower(name);
        self.channels_by_name
            .get(&folded)
            .and_then(|id| self.channels_by_id.get(id))
            .cloned()
    }

    #[must_use]
    pub fn self_user(&self) -> Option<Arc<User>> {
        self.self_id.and_then(|id| self.get_user(id))
    }

    pub fn users(&self) -> impl Iterator<Item = &Arc<User>> {
        self.users_by_id.values()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.channels_by_id.values()
    }

    /// Apply a `RPL_ISUPPORT` (005) line's parsed tokens to this snapshot's
    /// negotiated case-mapping, `CHANTYPES`, `PREFIX`, and `CHANMODES`.
    pub fn apply_isupport(&mut self, isupport: &Isupport<'_>) {
        self.casemapping = isupport.casemapping_parsed();
        self.chantypes = isupport.chantypes_or_default().to_owned();
        let prefix = isupport.prefix_or_default();
        self.prefix = PrefixTypes {
            modes: prefix.modes.to_owned(),
            symbols: prefix.prefixes.to_owned(),
        };
        let chanmodes = isupport.chanmodes_or_default();
        self.chanmodes = ChanModeTypes {
            a: chanmodes.a.to_owned(),
            b: chanmodes.b.to_owned(),
            c: chanmodes.c.to_owned(),
            d: chanmodes.d.to_owned(),
        };
    }
}

/// Holds the current published [`NetworkInfo`] snapshot behind a
/// `RwLock<Arc<_>>`: reads clone the `Arc` (cheap, lock-free after that
/// point), writes build a whole new snapshot and swap the lock's contents.
#[derive(Debug)]
pub struct StateStore {
    inner: RwLock<Arc<NetworkInfo>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(NetworkInfo::default())
    }
}

impl StateStore {
    #[must_use]
    pub fn new(info: NetworkInfo) -> Self {
        Self {
            inner: RwLock::new(Arc::new(info)),
        }
    }

    /// A stable, point-in-time view of the network.
    #[must_use]
    pub fn read(&self) -> Arc<NetworkInfo> {
        self.inner
            .read()
            .expect("state store lock poisoned")
            .clone()
    }

    fn publish(&self, next: NetworkInfo) {
        *self.inner.write().expect("state store lock poisoned") = Arc::new(next);
    }

    /// Mark `id` as the self user (published separately from
    /// [`update_user`](Self::update_user) since it carries no record data).
    pub fn set_self_id(&self, id: UserId) {
        let current = self.read();
        let mut next = (*current).clone();
        next.self_id = Some(id);
        self.publish(next);
    }

    pub fn apply_isupport(&self, isupport: &Isupport<'_>) {
        let current = self.read();
        let mut next = (*current).clone();
        next.apply_isupport(isupport);
        self.publish(next);
    }

    /// Publish a new or updated user record.
    ///
    /// A user update keeps its id if the nick is unchanged. A nick change
    /// re-indexes the nick lookup table. A nick collision against a
    /// *different* existing id raises [`StateError::NickCollision`].
    pub fn update_user(&self, user: User) -> Result<(), StateError> {
        let current = self.read();
        let mut next = (*current).clone();

        let folded_nick = next.casemapping.to_lower(&user.nick);

        if let Some(&existing_id) = next.users_by_nick.get(&folded_nick) {
            if existing_id != user.id {
                return Err(StateError::NickCollision { nick: user.nick });
            }
        }

        if let Some(old) = next.users_by_id.get(&user.id) {
            let old_folded = next.casemapping.to_lower(&old.nick);
            if old_folded != folded_nick {
                next.users_by_nick.remove(&old_folded);
            }
        }

        next.users_by_nick.insert(folded_nick, user.id);
        next.users_by_id.insert(user.id, Arc::new(user));

        self.publish(next);
        Ok(())
    }

    /// Publish a new or updated channel record.
    ///
    /// A rename to a name already claimed by a *different* channel id
    /// raises [`StateError::ChannelCollision`], unless the claimant is this
    /// same channel (i.e. the rename is a pure case change).
    pub fn update_channel(&self, channel: Channel) -> Result<(), StateError> {
        let current = self.read();
        let mut next = (*current).clone();

        let folded_name = next.casemapping.to_lower(&channel.name);

        if let Some(&existing_id) = next.channels_by_name.get(&folded_name) {
            if existing_id != channel.id {
                return Err(StateError::ChannelCollision { name: channel.name });
            }
        }

        if let Some(old) = next.channels_by_id.get(&channel.id) {
            let old_folded = next.casemapping.to_lower(&old.name);
            if old_folded != folded_name {
                next.channels_by_name.remove(&old_folded);
            }
        }

        next.channels_by_name.insert(folded_name, channel.id);
        next.channels_by_id.insert(channel.id, Arc::new(channel));

        self.publish(next);
        Ok(())
    }

    /// Remove a user/channel membership pair, keeping both sides of the
    /// adjacency in sync. If this was the user's last channel and they are
    /// not the self user, the user record is garbage-collected.
    pub fn remove_membership(&self, user_id: UserId, channel_id: ChannelId) {
        let current = self.read();
        let mut next = (*current).clone();

        if let Some(channel) = next.channels_by_id.get(&channel_id) {
            let mut updated = (**channel).clone();
            updated.users.remove(&user_id);
            next.channels_by_id.insert(channel_id, Arc::new(updated));
        }

        if let Some(user) = next.users_by_id.get(&user_id) {
            let mut updated = (**user).clone();
            updated.channels.remove(&channel_id);
            let is_self = next.self_id == Some(user_id);

            if updated.channels.is_empty() && !is_self {
                next.users_by_id.remove(&user_id);
                let folded = next.casemapping.to_lower(&updated.nick);
                next.users_by_nick.remove(&folded);
            } else {
                next.users_by_id.insert(user_id, Arc::new(updated));
            }
        }

        self.publish(next);
    }

    /// Remove a channel entirely (e.g. the last member parted).
    pub fn remove_channel(&self, channel_id: ChannelId) {
        let current = self.read();
        let mut next = (*current).clone();
        if let Some(channel) = next.channels_by_id.remove(&channel_id) {
            let folded = next.casemapping.to_lower(&channel.name);
            next.channels_by_name.remove(&folded);
        }
        self.publish(next);
    }

    /// `TryExtractUserFromSource` (spec §4.4): resolve a message's source
    /// hostmask to the matching known user, under the negotiated
    /// case-mapping.
    #[must_use]
    pub fn try_extract_user_from_source(&self, prefix: &Prefix) -> Option<Arc<User>> {
        let nick = prefix.nick()?;
        self.read().get_user_by_nick(nick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StateStore {
        StateStore::default()
    }

    #[test]
    fn update_user_keeps_id_on_identical_nick() {
        let store = store();
        let mut user = User::new("alice", "alice", "host");
        let id = user.id;
        store.update_user(user.clone()).unwrap();

        user.realname = "Alice".into();
        store.update_user(user).unwrap();

        let snapshot = store.read();
        assert_eq!(snapshot.get_user(id).unwrap().realname, "Alice");
    }

    #[test]
    fn nick_change_reindexes_lookup_table() {
        let store = store();
        let mut user = User::new("alice", "alice", "host");
        let id = user.id;
        store.update_user(user.clone()).unwrap();

        user.nick = "alicia".into();
        store.update_user(user).unwrap();

        let snapshot = store.read();
        assert!(snapshot.get_user_by_nick("alice").is_none());
        assert_eq!(snapshot.get_user_by_nick("alicia").unwrap().id, id);
    }

    #[test]
    fn nick_collision_with_different_id_errors() {
        let store = store();
        store.update_user(User::new("alice", "a", "h")).unwrap();

        let err = store
            .update_user(User::new("alice", "b", "h2"))
            .unwrap_err();
        assert!(matches!(err, StateError::NickCollision { .. }));
    }

    #[test]
    fn channel_rename_collision_with_different_id_errors() {
        let store = store();
        store.update_channel(Channel::new("#rust")).unwrap();

        let err = store.update_channel(Channel::new("#rust")).unwrap_err();
        assert!(matches!(err, StateError::ChannelCollision { .. }));
    }

    #[test]
    fn channel_rename_pure_case_change_is_allowed() {
        let store = store();
        let mut channel = Channel::new("#rust");
        let id = channel.id;
        store.update_channel(channel.clone()).unwrap();

        channel.name = "#Rust".into();
        store.update_channel(channel).unwrap();

        let snapshot = store.read();
        assert_eq!(snapshot.get_channel(id).unwrap().name, "#Rust");
        assert_eq!(snapshot.get_channel_by_name("#RUST").unwrap().id, id);
    }

    #[test]
    fn removing_last_membership_garbage_collects_non_self_user() {
        let store = store();
        let mut user = User::new("bob", "bob", "host");
        let user_id = user.id;
        let mut channel = Channel::new("#c");
        let channel_id = channel.id;

        user.channels.insert(channel_id, String::new());
        channel.users.insert(user_id, String::new());

        store.update_user(user).unwrap();
        store.update_channel(channel).unwrap();

        store.remove_membership(user_id, channel_id);

        let snapshot = store.read();
        assert!(snapshot.get_user(user_id).is_none());
        assert!(snapshot.get_user_by_nick("bob").is_none());
    }

    #[test]
    fn self_user_survives_losing_last_membership() {
        let store = store();
        let mut user = User::new("me", "me", "host");
        let user_id = user.id;
        let mut channel = Channel::new("#c");
        let channel_id = channel.id;

        user.channels.insert(channel_id, String::new());
        channel.users.insert(user_id, String::new());

        store.update_user(user).unwrap();
        store.update_channel(channel).unwrap();
        store.set_self_id(user_id);

        store.remove_membership(user_id, channel_id);

        let snapshot = store.read();
        assert!(snapshot.get_user(user_id).is_some());
    }

    #[test]
    fn try_extract_user_from_source_resolves_by_nick() {
        let store = store();
        let user = User::new("dan", "dan", "host");
        let id = user.id;
        store.update_user(user).unwrap();

        let prefix = Prefix::parse("dan!dan@host");
        let resolved = store.try_extract_user_from_source(&prefix).unwrap();
        assert_eq!(resolved.id, id);
    }
}
