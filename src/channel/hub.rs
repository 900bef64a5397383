//! # Broadcast hub shared by all contexts of a host.
//!
//! [`BroadcastHub`] maps channel names to broadcast groups. A group is the list
//! of live [`BroadcastChannel`](crate::BroadcastChannel) members of one name;
//! every member owns an unbounded queue the hub pushes envelopes into.
//!
//! ## Architecture
//! ```text
//! ctx A: post ──► publish("jobs", env) ──┬──► queue B ──► consumer B ──► inbox B
//!                 (skips the sender)     └──► queue C ──► consumer C ──► inbox C
//! ```
//!
//! ## Rules
//! - **Lazy groups**: a group is created on first join and pruned when its last
//!   member leaves.
//! - **Lossless**: queues are unbounded; a slow member never loses messages.
//! - **FIFO per sender**: publishing happens under the group lock, so every
//!   member sees one sender's posts in post order.
//! - **Bytes only**: envelopes carry serialized payloads; nothing else crosses contexts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::events::ContextId;

/// One posted message as it travels between contexts.
#[derive(Clone, Debug)]
pub(crate) struct Envelope {
    /// Posting member; never delivered back to it.
    pub(crate) sender: u64,
    pub(crate) origin: ContextId,
    pub(crate) seq: u64,
    pub(crate) at: SystemTime,
    pub(crate) payload: Bytes,
}

/// Membership handed to a new channel instance.
pub(crate) struct Membership {
    pub(crate) id: u64,
    pub(crate) queue: mpsc::UnboundedReceiver<Envelope>,
}

struct Member {
    id: u64,
    queue: mpsc::UnboundedSender<Envelope>,
}

/// Registry of broadcast groups keyed by channel name.
///
/// Cheap to clone; all clones share the same groups.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    groups: Arc<Mutex<HashMap<Arc<str>, Vec<Member>>>>,
    next_member: Arc<AtomicU64>,
}

impl BroadcastHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups with at least one member.
    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }

    /// Number of live members of `name` (0 if the group does not exist).
    pub fn member_count(&self, name: &str) -> usize {
        self.groups.lock().get(name).map_or(0, Vec::len)
    }

    /// Joins (creating if needed) the group for `name`.
    pub(crate) fn join(&self, name: &Arc<str>) -> Membership {
        let id = self.next_member.fetch_add(1, Ordering::Relaxed);
        let (tx, queue) = mpsc::unbounded_channel();
        self.groups
            .lock()
            .entry(Arc::clone(name))
            .or_default()
            .push(Member { id, queue: tx });
        Membership { id, queue }
    }

    /// Pushes `envelope` into the queue of every member of `name` except its sender.
    ///
    /// Returns how many members it was queued for. Members whose queue is gone
    /// are dropped from the group on the way.
    pub(crate) fn publish(&self, name: &str, envelope: &Envelope) -> usize {
        let mut groups = self.groups.lock();
        let Some(members) = groups.get_mut(name) else {
            return 0;
        };
        let mut queued = 0;
        members.retain(|m| {
            if m.id == envelope.sender {
                return true;
            }
            let alive = m.queue.send(envelope.clone()).is_ok();
            queued += usize::from(alive);
            alive
        });
        if members.is_empty() {
            let _ = groups.remove(name);
        }
        queued
    }

    /// Removes member `id` from `name`, dropping the group once it is empty.
    pub(crate) fn leave(&self, name: &str, id: u64) {
        let mut groups = self.groups.lock();
        if let Some(members) = groups.get_mut(name) {
            members.retain(|m| m.id != id);
            if members.is_empty() {
                let _ = groups.remove(name);
            }
        }
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("groups", &self.group_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(sender: u64, n: u8) -> Envelope {
        Envelope {
            sender,
            origin: ContextId(0),
            seq: 0,
            at: SystemTime::now(),
            payload: Bytes::from(vec![n]),
        }
    }

    #[test]
    fn groups_are_created_lazily_and_pruned() {
        let hub = BroadcastHub::new();
        let name: Arc<str> = Arc::from("jobs");
        assert_eq!(hub.group_count(), 0);

        let a = hub.join(&name);
        let b = hub.join(&name);
        assert_ne!(a.id, b.id);
        assert_eq!(hub.member_count("jobs"), 2);

        hub.leave(&name, a.id);
        assert_eq!(hub.group_count(), 1);

        hub.leave(&name, b.id);
        assert_eq!(hub.group_count(), 0);
        assert_eq!(hub.member_count("jobs"), 0);
    }

    #[test]
    fn publish_skips_sender_and_keeps_everything() {
        let hub = BroadcastHub::new();
        let name: Arc<str> = Arc::from("burst");
        let mut a = hub.join(&name);
        let mut b = hub.join(&name);

        for n in 0..=255u8 {
            assert_eq!(hub.publish(&name, &envelope(a.id, n)), 1);
        }
        for n in 0..=255u8 {
            assert_eq!(b.queue.try_recv().unwrap().payload[0], n);
        }
        assert!(a.queue.try_recv().is_err());
    }

    #[test]
    fn dead_members_are_dropped_on_publish() {
        let hub = BroadcastHub::new();
        let name: Arc<str> = Arc::from("gone");
        let a = hub.join(&name);
        let b = hub.join(&name);
        drop(b);

        assert_eq!(hub.publish(&name, &envelope(a.id, 1)), 0);
        assert_eq!(hub.member_count("gone"), 1);
    }
}
