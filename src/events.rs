//! Event/hook bus: ordered listener chain with short-circuit verdicts
//! for result-bearing events, full fan-out for broadcast-style events.

use std::collections::HashMap;

use crate::store::Uid;

/// The verdict a result-bearing listener returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Bypass remaining checks and accept the operation.
    Allow,
    /// Reject the operation; dispatch stops here.
    Deny,
    /// Defer to the next listener (or to the default behavior if none
    /// remain).
    Passthru,
}

/// Typed events the core fires, one variant per hook point the command
/// handlers and session lifecycle reach.
#[derive(Clone, Debug)]
pub enum EventKind {
    /// Before a command handler runs.
    PreCommand { uid: Uid, command: String },
    /// After a command handler ran.
    PostCommand { uid: Uid, command: String },
    /// Before a channel is created by JOIN (`chan` is `None` pre-creation).
    PreJoin { uid: Uid, channel: String },
    /// After a join completed and was broadcast.
    PostJoin { uid: Uid, channel: String },
    /// Before a membership is removed by PART.
    PrePart { uid: Uid, channel: String },
    /// After a part completed and was broadcast.
    PostPart { uid: Uid, channel: String },
    /// Before a NICK change is accepted.
    PreNick { uid: Uid, new_nick: String },
    /// After a NICK change was applied.
    PostNick { uid: Uid, old_nick: String },
    /// Before a PRIVMSG/NOTICE is fanned out.
    PreMessage { uid: Uid, target: String },
    /// After a PRIVMSG/NOTICE was fanned out.
    PostMessage { uid: Uid, target: String },
    /// Before a parsed MODE change list is applied.
    PreMode { uid: Uid, target: String },
    /// After a MODE change list was applied and broadcast.
    PostMode { uid: Uid, target: String },
    /// Channel key check on join.
    CheckKey { uid: Uid, channel: String },
    /// Channel limit check on join.
    CheckLimit { uid: Uid, channel: String },
    /// Channel invite-only check on join.
    CheckInvite { uid: Uid, channel: String },
    /// Channel ban check on join.
    CheckBan { uid: Uid, channel: String },
    /// Before an empty channel is destroyed.
    ChannelPreDelete { channel: String },
    /// An empty channel was destroyed.
    ChannelDelete { channel: String },
    /// A registration attempt reached NICK+USER; last chance to veto.
    UserPreRegister { uid: Uid },
    /// Registration completed.
    UserRegister { uid: Uid },
    /// A session is quitting.
    UserQuit { uid: Uid, reason: String },
}

/// Tag identifying an event kind independent of its payload, used as the
/// listener-registry key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKindTag {
    PreCommand,
    PostCommand,
    PreJoin,
    PostJoin,
    PrePart,
    PostPart,
    PreNick,
    PostNick,
    PreMessage,
    PostMessage,
    PreMode,
    PostMode,
    CheckKey,
    CheckLimit,
    CheckInvite,
    CheckBan,
    ChannelPreDelete,
    ChannelDelete,
    UserPreRegister,
    UserRegister,
    UserQuit,
}

impl EventKind {
    /// This event's registry tag.
    pub fn tag(&self) -> EventKindTag {
        match self {
            EventKind::PreCommand { .. } => EventKindTag::PreCommand,
            EventKind::PostCommand { .. } => EventKindTag::PostCommand,
            EventKind::PreJoin { .. } => EventKindTag::PreJoin,
            EventKind::PostJoin { .. } => EventKindTag::PostJoin,
            EventKind::PrePart { .. } => EventKindTag::PrePart,
            EventKind::PostPart { .. } => EventKindTag::PostPart,
            EventKind::PreNick { .. } => EventKindTag::PreNick,
            EventKind::PostNick { .. } => EventKindTag::PostNick,
            EventKind::PreMessage { .. } => EventKindTag::PreMessage,
            EventKind::PostMessage { .. } => EventKindTag::PostMessage,
            EventKind::PreMode { .. } => EventKindTag::PreMode,
            EventKind::PostMode { .. } => EventKindTag::PostMode,
            EventKind::CheckKey { .. } => EventKindTag::CheckKey,
            EventKind::CheckLimit { .. } => EventKindTag::CheckLimit,
            EventKind::CheckInvite { .. } => EventKindTag::CheckInvite,
            EventKind::CheckBan { .. } => EventKindTag::CheckBan,
            EventKind::ChannelPreDelete { .. } => EventKindTag::ChannelPreDelete,
            EventKind::ChannelDelete { .. } => EventKindTag::ChannelDelete,
            EventKind::UserPreRegister { .. } => EventKindTag::UserPreRegister,
            EventKind::UserRegister { .. } => EventKindTag::UserRegister,
            EventKind::UserQuit { .. } => EventKindTag::UserQuit,
        }
    }

    /// Whether this kind is result-bearing (short-circuits on the first
    /// non-`Passthru` verdict) rather than fan-out (every listener runs).
    pub fn is_result_bearing(&self) -> bool {
        matches!(
            self,
            EventKind::PreJoin { .. }
                | EventKind::PrePart { .. }
                | EventKind::PreNick { .. }
                | EventKind::PreMessage { .. }
                | EventKind::PreMode { .. }
                | EventKind::CheckKey { .. }
                | EventKind::CheckLimit { .. }
                | EventKind::CheckInvite { .. }
                | EventKind::CheckBan { .. }
                | EventKind::ChannelPreDelete { .. }
                | EventKind::UserPreRegister { .. }
        )
    }
}

/// Where a listener sits relative to its peers on the same event kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Priority {
    /// Run before every other listener on this event kind.
    First,
    /// Run after every other listener on this event kind.
    Last,
    /// Run immediately before the named listener.
    Before(String),
    /// Run immediately after the named listener.
    After(String),
}

/// A registered callback. The bus owns these as boxed closures; there is
/// no "module" indirection since this core has no dynamic loading.
struct Listener {
    name: String,
    priority: Priority,
    callback: Box<dyn Fn(&EventKind) -> Verdict>,
}

/// Ordered listener registry, keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKindTag, Vec<Listener>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `tag` under `name`, honoring `priority`
    /// relative to already-registered listeners.
    pub fn register(
        &mut self,
        tag: EventKindTag,
        name: impl Into<String>,
        priority: Priority,
        callback: impl Fn(&EventKind) -> Verdict + 'static,
    ) {
        let entry = self.listeners.entry(tag).or_default();
        let listener = Listener {
            name: name.into(),
            priority,
            callback: Box::new(callback),
        };
        insert_by_priority(entry, listener);
    }

    /// Fire an event. For result-bearing kinds, stops at the first
    /// non-`Passthru` verdict; if every listener passes through (or none
    /// are registered) the result is `Passthru`, which callers treat as
    /// "run the default check" — an explicit `Allow` bypasses it, a `Deny`
    /// rejects the operation. For fan-out kinds, every listener runs and
    /// the return value is always `Allow`.
    pub fn fire(&self, event: &EventKind) -> Verdict {
        let tag = event.tag();
        let Some(listeners) = self.listeners.get(&tag) else {
            return if event.is_result_bearing() {
                Verdict::Passthru
            } else {
                Verdict::Allow
            };
        };

        if event.is_result_bearing() {
            for listener in listeners {
                match (listener.callback)(event) {
                    Verdict::Passthru => continue,
                    verdict => return verdict,
                }
            }
            Verdict::Passthru
        } else {
            for listener in listeners {
                (listener.callback)(event);
            }
            Verdict::Allow
        }
    }
}

/// Insert `listener` into `entry` respecting its priority, breaking ties
/// on registration order (stable insertion).
fn insert_by_priority(entry: &mut Vec<Listener>, listener: Listener) {
    match &listener.priority {
        Priority::First => entry.insert(0, listener),
        Priority::Last => entry.push(listener),
        Priority::Before(other) => {
            let pos = entry.iter().position(|l| &l.name == other).unwrap_or(entry.len());
            entry.insert(pos, listener);
        }
        Priority::After(other) => {
            let pos = entry
                .iter()
                .position(|l| &l.name == other)
                .map(|i| i + 1)
                .unwrap_or(entry.len());
            entry.insert(pos, listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn uid() -> Uid {
        Uid("1AAAAAAAA".to_string())
    }

    #[test]
    fn fan_out_event_runs_every_listener() {
        let mut bus = EventBus::new();
        let calls = Rc::new(RefCell::new(0));
        for i in 0..3 {
            let calls = calls.clone();
            bus.register(EventKindTag::PostJoin, format!("l{i}"), Priority::Last, move |_| {
                *calls.borrow_mut() += 1;
                Verdict::Allow
            });
        }
        bus.fire(&EventKind::PostJoin { uid: uid(), channel: "#test".into() });
        assert_eq!(*calls.borrow(), 3);
    }

    #[test]
    fn result_bearing_event_stops_at_first_deny() {
        let mut bus = EventBus::new();
        let calls = Rc::new(RefCell::new(0));
        bus.register(EventKindTag::PreJoin, "a", Priority::First, |_| Verdict::Deny);
        let calls2 = calls.clone();
        bus.register(EventKindTag::PreJoin, "b", Priority::Last, move |_| {
            *calls2.borrow_mut() += 1;
            Verdict::Allow
        });
        let verdict = bus.fire(&EventKind::PreJoin { uid: uid(), channel: "#test".into() });
        assert_eq!(verdict, Verdict::Deny);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn passthru_falls_through_to_next_listener() {
        let mut bus = EventBus::new();
        bus.register(EventKindTag::CheckBan, "noop", Priority::First, |_| Verdict::Passthru);
        bus.register(EventKindTag::CheckBan, "deny", Priority::Last, |_| Verdict::Deny);
        let verdict = bus.fire(&EventKind::CheckBan { uid: uid(), channel: "#test".into() });
        assert_eq!(verdict, Verdict::Deny);
    }

    #[test]
    fn no_listeners_defaults_to_passthru_for_checks() {
        let bus = EventBus::new();
        let verdict = bus.fire(&EventKind::CheckKey { uid: uid(), channel: "#test".into() });
        assert_eq!(verdict, Verdict::Passthru);
    }

    #[test]
    fn explicit_allow_short_circuits() {
        let mut bus = EventBus::new();
        bus.register(EventKindTag::CheckKey, "bypass", Priority::First, |_| Verdict::Allow);
        bus.register(EventKindTag::CheckKey, "deny", Priority::Last, |_| Verdict::Deny);
        let verdict = bus.fire(&EventKind::CheckKey { uid: uid(), channel: "#test".into() });
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn before_priority_inserts_ahead_of_named_listener() {
        let mut bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = order.clone();
        bus.register(EventKindTag::PostPart, "second", Priority::Last, move |_| {
            o1.borrow_mut().push("second");
            Verdict::Allow
        });
        let o2 = order.clone();
        bus.register(EventKindTag::PostPart, "first", Priority::Before("second".into()), move |_| {
            o2.borrow_mut().push("first");
            Verdict::Allow
        });
        bus.fire(&EventKind::PostPart { uid: uid(), channel: "#test".into() });
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }
}
