//! # Named broadcast channel instance.
//!
//! A [`BroadcastChannel`] is one context's handle on a named group of the
//! [`BroadcastHub`]. Posting serializes the value with the poster's bridge and
//! queues the bytes for every *other* live member; each member rebuilds the
//! value in its own consumer task.
//!
//! ## Architecture
//! ```text
//! post(&Value)
//!     └─► bridge.serialize_to_bytes ─► Envelope{sender, origin, seq, payload}
//!             └─► hub.publish ─► queue of every other member
//!
//! consumer task (one per instance, child token of the context)
//!     loop {
//!         select! {
//!             cancelled         ─► exit
//!             envelope          ─► deserialize ok?  ─► inbox.send(MessageEvent)
//!                               ─► deserialize err  ─► warn, drop this delivery
//!         }
//!     }
//!     hub.leave(name, member)
//!
//! recv().await / try_recv() ─► inbox
//! ```
//!
//! ## Rules
//! - Delivery order is FIFO per sender instance; nothing is promised across senders.
//! - A live instance receives every post of every other instance, however far
//!   behind its consumer is.
//! - A failed deserialization drops the message for that receiver only.
//! - After [`close`](BroadcastChannel::close), dropping the instance or halting
//!   its context, nothing is delivered anymore and `post` fails.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bridge::SerializationBridge;
use crate::channel::hub::{BroadcastHub, Envelope, Membership};
use crate::error::ChannelError;
use crate::events::{ContextId, MessageEvent, next_seq};
use crate::value::Value;

/// One context's subscription to a named broadcast group.
pub struct BroadcastChannel {
    id: u64,
    name: Arc<str>,
    origin: ContextId,
    hub: BroadcastHub,
    bridge: SerializationBridge,
    inbox: mpsc::UnboundedReceiver<MessageEvent>,
    token: CancellationToken,
}

impl BroadcastChannel {
    /// Joins the group `name` and starts the consumer task.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub(crate) fn open(
        hub: &BroadcastHub,
        name: Arc<str>,
        bridge: SerializationBridge,
        origin: ContextId,
        parent: &CancellationToken,
    ) -> Self {
        let Membership { id, queue } = hub.join(&name);
        let token = parent.child_token();
        let (inbox_tx, inbox) = mpsc::unbounded_channel();

        let consumer = Consumer {
            id,
            name: Arc::clone(&name),
            bridge: bridge.clone(),
            hub: hub.clone(),
            inbox: inbox_tx,
            token: token.clone(),
        };
        tokio::spawn(consumer.run(queue));

        debug!(channel = %name, member = id, context = %origin, "channel opened");
        Self {
            id,
            name,
            origin,
            hub: hub.clone(),
            bridge,
            inbox,
            token,
        }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` after [`close`](Self::close) or once the owning context halted.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sends a copy of `value` to every other live instance of this name.
    ///
    /// Never blocks. Posting with no other member is not an error.
    ///
    /// # Errors
    /// - [`ChannelError::Clone`] if the value cannot be serialized; nothing is sent.
    /// - [`ChannelError::Closed`] if this instance was closed.
    pub fn post(&self, value: &Value) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed {
                name: Arc::clone(&self.name),
            });
        }
        let envelope = Envelope {
            sender: self.id,
            origin: self.origin,
            seq: next_seq(),
            at: SystemTime::now(),
            payload: self.bridge.serialize_to_bytes(value)?.into(),
        };
        let receivers = self.hub.publish(&self.name, &envelope);
        debug!(channel = %self.name, member = self.id, receivers, "posted");
        Ok(())
    }

    /// Waits for the next delivery.
    ///
    /// Returns `None` once the instance is closed.
    pub async fn recv(&mut self) -> Option<MessageEvent> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            ev = self.inbox.recv() => ev,
        }
    }

    /// Returns a pending delivery without waiting.
    pub fn try_recv(&mut self) -> Option<MessageEvent> {
        if self.is_closed() {
            return None;
        }
        self.inbox.try_recv().ok()
    }

    /// Unsubscribes. Undelivered messages are discarded. Idempotent.
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            debug!(channel = %self.name, member = self.id, "channel closed");
            self.token.cancel();
        }
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("name", &self.name)
            .field("member", &self.id)
            .field("origin", &self.origin)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Per-instance delivery loop.
struct Consumer {
    id: u64,
    name: Arc<str>,
    bridge: SerializationBridge,
    hub: BroadcastHub,
    inbox: mpsc::UnboundedSender<MessageEvent>,
    token: CancellationToken,
}

impl Consumer {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<Envelope>) {
        loop {
            let envelope = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                env = queue.recv() => env,
            };
            match envelope {
                Some(env) => {
                    if !self.deliver(env) {
                        break;
                    }
                }
                None => break,
            }
        }
        self.hub.leave(&self.name, self.id);
    }

    /// Returns `false` when the owning instance is gone.
    fn deliver(&self, env: Envelope) -> bool {
        let data = match self.bridge.deserialize_from_bytes(&env.payload) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    channel = %self.name,
                    member = self.id,
                    origin = %env.origin,
                    error = %e,
                    "undecodable message dropped"
                );
                return true;
            }
        };
        let event = MessageEvent {
            data,
            channel: Arc::clone(&self.name),
            origin: env.origin,
            seq: env.seq,
            at: env.at,
        };
        self.inbox.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::WireClone;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn open(
        hub: &BroadcastHub,
        name: &str,
        ctx: u64,
        root: &CancellationToken,
    ) -> BroadcastChannel {
        BroadcastChannel::open(
            hub,
            Arc::from(name),
            SerializationBridge::default(),
            ContextId(ctx),
            root,
        )
    }

    async fn next(ch: &mut BroadcastChannel) -> MessageEvent {
        timeout(WAIT, ch.recv())
            .await
            .expect("delivery timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn posts_reach_others_but_not_self() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let mut a = open(&hub, "x", 1, &root);
        let mut b = open(&hub, "x", 2, &root);

        a.post(&Value::from(1)).unwrap();
        let ev = next(&mut b).await;
        assert_eq!(ev.data, Value::from(1));
        assert_eq!(ev.origin, ContextId(1));
        assert_eq!(&*ev.channel, "x");

        b.post(&Value::from("marker")).unwrap();
        let ev = next(&mut a).await;
        assert_eq!(ev.data, Value::from("marker"));
        assert!(a.try_recv().is_none(), "a must not see its own post");
    }

    #[tokio::test]
    async fn deliveries_are_fifo_per_sender() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let a = open(&hub, "q", 1, &root);
        let mut b = open(&hub, "q", 2, &root);

        for i in 0..20 {
            a.post(&Value::from(i)).unwrap();
        }
        let mut last_seq = None;
        for i in 0..20 {
            let ev = next(&mut b).await;
            assert_eq!(ev.data, Value::from(i));
            assert!(last_seq.is_none_or(|s| ev.seq > s));
            last_seq = Some(ev.seq);
        }
    }

    #[tokio::test]
    async fn burst_without_yielding_is_fully_delivered() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let a = open(&hub, "burst", 1, &root);
        let mut b = open(&hub, "burst", 2, &root);

        for i in 0..5000 {
            a.post(&Value::from(i)).unwrap();
        }
        for i in 0..5000 {
            assert_eq!(next(&mut b).await.data, Value::from(i));
        }
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn receivers_get_independent_copies() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let a = open(&hub, "m", 1, &root);
        let mut b = open(&hub, "m", 2, &root);
        let mut c = open(&hub, "m", 3, &root);

        let v = Value::object([("n", Value::from(5))]);
        a.post(&v).unwrap();
        let mut from_b = next(&mut b).await.data;
        let from_c = next(&mut c).await.data;
        if let Value::Object(props) = &mut from_b {
            let _ = props.insert("n".to_string(), Value::from(6));
        }
        assert_eq!(from_c, v);
        assert_ne!(from_b, from_c);
    }

    #[tokio::test]
    async fn undecodable_delivery_is_dropped_for_that_receiver_only() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let a = open(&hub, "d", 1, &root);
        let mut deep = open(&hub, "d", 2, &root);
        let mut shallow = BroadcastChannel::open(
            &hub,
            Arc::from("d"),
            SerializationBridge::new(Arc::new(WireClone::new(1))),
            ContextId(3),
            &root,
        );

        let nested = Value::array([Value::array([1])]);
        a.post(&nested).unwrap();
        a.post(&Value::from("flat")).unwrap();

        assert_eq!(next(&mut deep).await.data, nested);
        assert_eq!(next(&mut deep).await.data, Value::from("flat"));
        assert_eq!(next(&mut shallow).await.data, Value::from("flat"));
    }

    #[tokio::test]
    async fn unserializable_post_fails_and_sends_nothing() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let a = open(&hub, "f", 1, &root);
        let mut b = open(&hub, "f", 2, &root);

        let err = a.post(&Value::Function("cb".into())).unwrap_err();
        assert!(matches!(err, ChannelError::Clone(_)));

        a.post(&Value::Null).unwrap();
        assert_eq!(next(&mut b).await.data, Value::Null);
    }

    #[tokio::test]
    async fn closed_channel_is_silent() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let a = open(&hub, "c", 1, &root);
        let mut b = open(&hub, "c", 2, &root);

        b.close();
        a.post(&Value::from(1)).unwrap();
        assert!(timeout(WAIT, b.recv()).await.unwrap().is_none());
        assert!(b.try_recv().is_none());
        assert!(b.is_closed());

        let err = b.post(&Value::from(2)).unwrap_err();
        assert!(matches!(err, ChannelError::Closed { .. }));
    }

    #[tokio::test]
    async fn cancelling_the_parent_closes_and_prunes() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let mut a = open(&hub, "p", 1, &root);
        assert_eq!(hub.member_count("p"), 1);

        root.cancel();
        assert!(a.is_closed());
        assert!(timeout(WAIT, a.recv()).await.unwrap().is_none());

        timeout(WAIT, async {
            while hub.group_count() != 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("group not pruned");
    }

    #[tokio::test]
    async fn post_without_peers_is_ok() {
        let hub = BroadcastHub::new();
        let root = CancellationToken::new();
        let a = open(&hub, "alone", 1, &root);
        assert!(a.post(&Value::from(true)).is_ok());
    }
}
