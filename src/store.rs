//! Entity store: process-wide indices for users and channels.
//!
//! Owned outright by the single core loop — no interior mutability, no
//! `Arc`, just a `HashMap` mutated by `&mut self`.

use std::collections::HashMap;
use std::fmt;

use ember_proto::Casemap;

use crate::channel::Channel;
use crate::user::User;

/// Opaque per-session identifier, stable across nick changes.
///
/// Formatted as `<SID><base36 counter>`, the TS6-style UID scheme, so a
/// future linking layer can route on the SID prefix.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Uid(pub String);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates unique UIDs for one server instance.
pub struct UidGen {
    sid: String,
    next: u64,
}

impl UidGen {
    /// Create a generator for the given three-character SID.
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            next: 0,
        }
    }

    /// Allocate the next UID.
    pub fn next(&mut self) -> Uid {
        let n = self.next;
        self.next += 1;
        Uid(format!("{}{}", self.sid, to_base36(n)))
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "A".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 digits are ASCII")
}

/// Failures `insert_user`/`rename_user` can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another user already holds this nickname.
    DuplicateNick,
    /// Another user already holds this UID (should not happen; UIDs are
    /// generator-issued).
    DuplicateUid,
    /// The requested nickname fails the C1 validity rule.
    InvalidNick,
    /// The requested nickname is already in use by someone else.
    NickInUse,
}

/// Process-wide mappings for users (by UID and by folded nick) and
/// channels (by folded name). All lookups are O(1) expected.
pub struct Store {
    casemap: Casemap,
    users_by_nick: HashMap<String, Uid>,
    users: HashMap<Uid, User>,
    channels: HashMap<String, Channel>,
}

impl Store {
    /// Create an empty store under the given casemap.
    pub fn new(casemap: Casemap) -> Self {
        Self {
            casemap,
            users_by_nick: HashMap::new(),
            users: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    /// The active casemap.
    pub fn casemap(&self) -> Casemap {
        self.casemap
    }

    /// Fold a string (nick or channel name) under the active casemap.
    pub fn fold(&self, s: &str) -> String {
        self.casemap.fold(s)
    }

    /// Look up a user by nickname (case-folded).
    pub fn find_user_by_nick(&self, nick: &str) -> Option<&User> {
        self.users_by_nick
            .get(&self.fold(nick))
            .and_then(|uid| self.users.get(uid))
    }

    /// Look up a user by UID.
    pub fn find_user_by_uid(&self, uid: &Uid) -> Option<&User> {
        self.users.get(uid)
    }

    /// Mutable lookup by UID.
    pub fn find_user_by_uid_mut(&mut self, uid: &Uid) -> Option<&mut User> {
        self.users.get_mut(uid)
    }

    /// Insert a newly-connected user. Fails if the UID or (once set) the
    /// nick is already taken.
    pub fn insert_user(&mut self, user: User) -> Result<(), StoreError> {
        if self.users.contains_key(&user.uid) {
            return Err(StoreError::DuplicateUid);
        }
        if !user.nick.is_empty() {
            let folded = self.fold(&user.nick);
            if self.users_by_nick.contains_key(&folded) {
                return Err(StoreError::DuplicateNick);
            }
            self.users_by_nick.insert(folded, user.uid.clone());
        }
        self.users.insert(user.uid.clone(), user);
        Ok(())
    }

    /// Atomically rename a user: erase the old nick key, insert the new
    /// one. The nick must already have passed [`ember_proto::nick::is_valid_nick`].
    pub fn rename_user(&mut self, uid: &Uid, new_nick: &str) -> Result<String, StoreError> {
        let folded_new = self.fold(new_nick);
        if let Some(existing) = self.users_by_nick.get(&folded_new) {
            if existing != uid {
                return Err(StoreError::NickInUse);
            }
        }
        let old_nick = {
            let user = self.users.get(uid).ok_or(StoreError::NickInUse)?;
            user.nick.clone()
        };
        let folded_old = self.fold(&old_nick);
        self.users_by_nick.remove(&folded_old);
        self.users_by_nick.insert(folded_new, uid.clone());
        if let Some(user) = self.users.get_mut(uid) {
            user.nick = new_nick.to_string();
        }
        Ok(old_nick)
    }

    /// Remove a user entirely. Callers must have already drained the
    /// user's channel memberships.
    pub fn remove_user(&mut self, uid: &Uid) -> Option<User> {
        if let Some(user) = self.users.get(uid) {
            let folded = self.fold(&user.nick);
            self.users_by_nick.remove(&folded);
        }
        self.users.remove(uid)
    }

    /// Look up a channel by name (case-folded).
    pub fn find_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.fold(name))
    }

    /// Mutable channel lookup.
    pub fn find_channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(&self.fold(name))
    }

    /// Insert a newly-created channel under its folded name.
    pub fn insert_channel(&mut self, channel: Channel) {
        let key = self.fold(&channel.name);
        self.channels.insert(key, channel);
    }

    /// Remove a channel (after `check_destroy` confirms it's empty and
    /// undeferred).
    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(&self.fold(name))
    }

    /// All channels, for iteration (rehash rebuild, stats).
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Rebuild both hash indices under a new casemap (a rehash can change
    /// the fold, which invalidates every existing key).
    /// Must run atomically with respect to command dispatch; callers hold
    /// the store exclusively while this runs, which the single-threaded
    /// core loop already guarantees.
    pub fn rebuild_indices(&mut self, new_casemap: Casemap) {
        self.casemap = new_casemap;

        let mut rebuilt_nicks = HashMap::with_capacity(self.users_by_nick.len());
        for user in self.users.values() {
            rebuilt_nicks.insert(self.casemap.fold(&user.nick), user.uid.clone());
        }
        self.users_by_nick = rebuilt_nicks;

        let old_channels = std::mem::take(&mut self.channels);
        for (_, channel) in old_channels {
            let key = self.casemap.fold(&channel.name);
            self.channels.insert(key, channel);
        }
    }
}
