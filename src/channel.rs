//! Channels and memberships: lifecycle, per-member prefix ranks, topic,
//! mode state, and broadcast with rank/exemption filters.

use std::collections::{HashMap, HashSet};

use ember_proto::mode::{channel_prefix_sigils, find_channel_mode};
use ember_proto::{cidr_match, wildcard_match_cm, Casemap, IrcEncode, Message};

use crate::store::{Store, Uid};
use crate::user::User;

/// Numeric rank for a prefix-mode letter, 0 if it's not a prefix mode.
fn rank_of(letter: char) -> u8 {
    find_channel_mode(letter)
        .and_then(|s| s.rank)
        .map(|r| r.0)
        .unwrap_or(0)
}

/// Topic text plus who set it and when.
#[derive(Clone, Debug)]
pub struct Topic {
    /// Topic text.
    pub text: String,
    /// Hostmask or nick of whoever last set it.
    pub setter: String,
    /// Unix seconds it was set.
    pub set_time: i64,
}

/// A (user, channel) relation carrying the member's held prefix-mode
/// letters, kept strictly rank-descending so the first letter always
/// determines the visible status character.
#[derive(Clone, Debug, Default)]
pub struct Membership {
    /// Prefix-mode letters held, ordered by descending rank.
    pub prefixes: Vec<char>,
}

impl Membership {
    /// The display-prefix sigil for this member's highest-ranked mode,
    /// or `None` if they hold no prefix mode.
    pub fn status_sigil(&self) -> Option<char> {
        let letter = *self.prefixes.first()?;
        let spec = find_channel_mode(letter)?;
        spec.prefix_sigil
    }

    /// Grant a prefix-mode letter, keeping `prefixes` sorted by rank.
    pub fn grant(&mut self, letter: char) {
        if self.prefixes.contains(&letter) {
            return;
        }
        self.prefixes.push(letter);
        self.prefixes.sort_by(|a, b| {
            let ra = rank_of(*a);
            let rb = rank_of(*b);
            rb.cmp(&ra)
        });
    }

    /// Revoke a prefix-mode letter.
    pub fn revoke(&mut self, letter: char) {
        self.prefixes.retain(|&c| c != letter);
    }

    /// The highest rank this member currently holds, 0 if none.
    pub fn highest_rank(&self) -> u8 {
        self.prefixes.first().map(|l| rank_of(*l)).unwrap_or(0)
    }
}

/// A ban-list entry: either a plain mask or an extban `<name>:<value>`
/// form, with optional `~` inversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BanEntry {
    /// The raw mask/extban text as set.
    pub mask: String,
    /// Hostmask that set the ban.
    pub set_by: String,
    /// Unix seconds it was set.
    pub set_at: i64,
}

/// A channel: creation time, topic, mode state, and the member map.
pub struct Channel {
    /// Channel name, original case (lookup is by folded name via the
    /// store; this field preserves what JOIN actually typed).
    pub name: String,
    /// Unix seconds at creation.
    pub created: i64,
    /// Current topic, if any.
    pub topic: Option<Topic>,
    /// Flag-shaped modes currently set (n, t, s, i, m, p, ...).
    pub flags: std::collections::HashSet<char>,
    /// `+k` key, if set.
    pub key: Option<String>,
    /// `+l` limit, if set.
    pub limit: Option<u32>,
    /// `+b` ban list.
    pub bans: Vec<BanEntry>,
    /// `+e` except list.
    pub excepts: Vec<BanEntry>,
    /// `+I` invite-exception list.
    pub invex: Vec<BanEntry>,
    /// Pending invites: folded nick -> granted-at unix seconds.
    pub invites: HashMap<String, i64>,
    /// Member map: the authoritative index. The channel uniquely owns
    /// its memberships; users mirror only the folded channel name.
    pub members: HashMap<Uid, Membership>,
}

impl Channel {
    /// Create a new, empty channel.
    pub fn new(name: impl Into<String>, created: i64) -> Self {
        Channel {
            name: name.into(),
            created,
            topic: None,
            flags: std::collections::HashSet::new(),
            key: None,
            limit: None,
            bans: Vec::new(),
            excepts: Vec::new(),
            invex: Vec::new(),
            invites: HashMap::new(),
            members: HashMap::new(),
        }
    }

    /// Create a membership if absent, otherwise return the existing one
    /// unchanged.
    pub fn join(&mut self, uid: Uid) -> &mut Membership {
        self.members.entry(uid).or_default()
    }

    /// Whether `uid` currently has a membership here.
    pub fn has_member(&self, uid: &Uid) -> bool {
        self.members.contains_key(uid)
    }

    /// Remove a membership (PART/KICK/QUIT).
    pub fn remove_member(&mut self, uid: &Uid) -> Option<Membership> {
        self.members.remove(uid)
    }

    /// Whether the channel is empty and therefore a `check_destroy`
    /// candidate. An emptied channel is destroyed in the same event tick
    /// unless a pre-delete hook defers it.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The display status-prefix string for NAMES, built from the
    /// registered prefix sigils in rank order (highest first), matching
    /// the order `channel_prefix_sigils` returns.
    pub fn status_prefix_order() -> String {
        channel_prefix_sigils()
    }

    /// Whether `user` matches any ban entry and no except entry. The
    /// invite-exception list (+I) is consulted separately by the
    /// invite-only check, not here.
    pub fn is_banned(&self, user: &User, casemap: Casemap) -> bool {
        self.bans.iter().any(|b| ban_matches(&b.mask, user, casemap))
            && !self
                .excepts
                .iter()
                .any(|e| ban_matches(&e.mask, user, casemap))
    }

    /// Write `message` to every local member whose rank is at least
    /// `min_rank` and who isn't in `except`. Memberships hold only `Uid`s,
    /// so the user objects themselves come from `store`.
    pub fn broadcast(&self, store: &Store, message: &Message, min_rank: u8, except: &HashSet<Uid>) {
        let bytes = message.to_bytes();
        for (uid, membership) in &self.members {
            if except.contains(uid) || membership.highest_rank() < min_rank {
                continue;
            }
            if let Some(user) = store.find_user_by_uid(uid) {
                user.send_raw(bytes.clone());
            }
        }
    }
}

/// Match one ban-list entry against a user.
/// A plain `nick!user@host` mask is globbed against the user's
/// real host, displayed host, and IP form; a host part containing `/` is
/// treated as a CIDR prefix against the connection address. An extended
/// `<name>:<value>` entry (optionally `~`-inverted) is delegated to a
/// registered extban handler; the core registers none, so those entries
/// never match here.
pub fn ban_matches(mask: &str, user: &User, casemap: Casemap) -> bool {
    if parse_extban(mask).is_some() {
        return false;
    }

    let (userpart, hostpart) = match mask.rsplit_once('@') {
        Some(split) => split,
        None => (mask, "*"),
    };

    let ip = user.addr.ip().to_string();
    if hostpart.contains('/') {
        return cidr_match(user.addr.ip(), hostpart)
            && wildcard_match_cm(
                userpart,
                &format!("{}!{}", user.nick, user.ident),
                casemap,
            );
    }

    [&user.real_host, &user.displayed_host, &ip].iter().any(|host| {
        wildcard_match_cm(
            mask,
            &format!("{}!{}@{}", user.nick, user.ident, host),
            casemap,
        )
    })
}

/// Split an extended-ban entry into (inverted, name, value), or `None`
/// for a plain hostmask. The name must be short and purely alphabetic so
/// IPv6 host masks (which also contain `:`) don't false-positive.
pub fn parse_extban(mask: &str) -> Option<(bool, &str, &str)> {
    let (inverted, rest) = match mask.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, mask),
    };
    let (name, value) = rest.split_once(':')?;
    if name.is_empty()
        || name.len() > 20
        || !name.chars().all(|c| c.is_ascii_alphabetic())
    {
        return None;
    }
    Some((inverted, name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn uid(s: &str) -> Uid {
        Uid(s.to_string())
    }

    fn banned_user(nick: &str, ident: &str, host: &str, addr: &str) -> User {
        let addr: SocketAddr = addr.parse().unwrap();
        let mut user = User::new(uid("1AAAAAAAA"), addr, host.to_string());
        user.nick = nick.to_string();
        user.ident = ident.to_string();
        user
    }

    #[test]
    fn join_creates_membership_once() {
        let mut chan = Channel::new("#test", 0);
        chan.join(uid("1AAAAAAAA"));
        assert_eq!(chan.members.len(), 1);
        chan.join(uid("1AAAAAAAA"));
        assert_eq!(chan.members.len(), 1);
    }

    #[test]
    fn membership_grant_keeps_descending_rank_order() {
        let mut m = Membership::default();
        m.grant('v');
        m.grant('o');
        m.grant('h');
        assert_eq!(m.prefixes, vec!['o', 'h', 'v']);
    }

    #[test]
    fn status_sigil_reflects_highest_rank() {
        let mut m = Membership::default();
        m.grant('v');
        assert_eq!(m.status_sigil(), Some('+'));
        m.grant('o');
        assert_eq!(m.status_sigil(), Some('@'));
    }

    #[test]
    fn revoke_removes_letter() {
        let mut m = Membership::default();
        m.grant('o');
        m.grant('v');
        m.revoke('o');
        assert_eq!(m.prefixes, vec!['v']);
    }

    #[test]
    fn empty_after_last_member_removed() {
        let mut chan = Channel::new("#test", 0);
        chan.join(uid("1AAAAAAAA"));
        assert!(!chan.is_empty());
        chan.remove_member(&uid("1AAAAAAAA"));
        assert!(chan.is_empty());
    }

    #[test]
    fn plain_mask_matches_real_host() {
        let user = banned_user("bob", "b", "badhost", "10.0.0.1:5000");
        assert!(ban_matches("*!*@badhost", &user, Casemap::Rfc1459));
        assert!(!ban_matches("*!*@goodhost", &user, Casemap::Rfc1459));
    }

    #[test]
    fn mask_matches_ip_form() {
        let user = banned_user("bob", "b", "some.rdns.example", "10.0.0.1:5000");
        assert!(ban_matches("*!*@10.0.0.1", &user, Casemap::Rfc1459));
    }

    #[test]
    fn cidr_mask_matches_prefix() {
        let user = banned_user("bob", "b", "host", "10.0.3.7:5000");
        assert!(ban_matches("*!*@10.0.0.0/16", &user, Casemap::Rfc1459));
        assert!(!ban_matches("*!*@10.1.0.0/16", &user, Casemap::Rfc1459));
    }

    #[test]
    fn nick_part_is_case_folded() {
        let user = banned_user("Bob[away]", "b", "host", "10.0.0.1:5000");
        assert!(ban_matches("bob{away}!*@*", &user, Casemap::Rfc1459));
    }

    #[test]
    fn extban_entries_are_recognized_but_do_not_match() {
        let user = banned_user("bob", "b", "host", "10.0.0.1:5000");
        assert_eq!(parse_extban("j:#other"), Some((false, "j", "#other")));
        assert_eq!(parse_extban("~a:acct"), Some((true, "a", "acct")));
        assert_eq!(parse_extban("*!*@host"), None);
        assert_eq!(parse_extban("*!*@2001:db8::1"), None);
        assert!(!ban_matches("j:#other", &user, Casemap::Rfc1459));
    }

    #[test]
    fn except_list_overrides_ban() {
        let mut chan = Channel::new("#test", 0);
        let user = banned_user("bob", "b", "badhost", "10.0.0.1:5000");
        chan.bans.push(BanEntry {
            mask: "*!*@badhost".into(),
            set_by: "op".into(),
            set_at: 0,
        });
        assert!(chan.is_banned(&user, Casemap::Rfc1459));
        chan.excepts.push(BanEntry {
            mask: "bob!*@*".into(),
            set_by: "op".into(),
            set_at: 0,
        });
        assert!(!chan.is_banned(&user, Casemap::Rfc1459));
    }
}
