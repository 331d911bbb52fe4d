//! Push-frame dispatcher: decodes incoming push frames into
//! [`PushMessage`]s and delivers them to the caller's callback in
//! receipt order, with a bounded drop-oldest queue absorbing a slow
//! callback.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::codec::{PushFrame, Value};
use crate::events::{emit, Event, Severity};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Message,
    PMessage,
    SMessage,
    Other,
}

#[derive(Debug, Clone)]
pub struct PushMessage {
    pub kind: PushKind,
    pub channel: Vec<u8>,
    pub pattern: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Default queue depth before the dispatcher starts dropping the
/// oldest undelivered message to make room for the newest.
pub const DEFAULT_QUEUE_BOUND: usize = 1024;

struct Ring {
    queue: Mutex<VecDeque<PushMessage>>,
    notify: Notify,
    bound: usize,
}

/// Spawns the dispatcher task; returns once spawned, the task runs for
/// the lifetime of `push_rx`.
pub fn spawn(
    mut push_rx: mpsc::UnboundedReceiver<PushFrame>,
    on_message: Arc<dyn Fn(PushMessage) + Send + Sync>,
    bound: usize,
) {
    let ring = Arc::new(Ring {
        queue: Mutex::new(VecDeque::with_capacity(bound)),
        notify: Notify::new(),
        bound,
    });

    let reader_ring = ring.clone();
    tokio::spawn(async move {
        while let Some(frame) = push_rx.recv().await {
            if let Some(msg) = decode_push(frame) {
                push_with_backpressure(&reader_ring, msg);
            }
        }
    });

    tokio::spawn(async move {
        loop {
            let msg = {
                let mut queue = ring.queue.lock();
                queue.pop_front()
            };
            match msg {
                Some(m) => on_message(m),
                None => ring.notify.notified().await,
            }
        }
    });
}

fn push_with_backpressure(ring: &Ring, msg: PushMessage) {
    let mut queue = ring.queue.lock();
    if queue.len() >= ring.bound {
        let dropped = queue.pop_front();
        let channel = dropped.as_ref().map(|m| String::from_utf8_lossy(&m.channel).into_owned());
        warn!(channel = channel.as_deref().unwrap_or(""), queue_bound = ring.bound, "dropping oldest pub/sub message, subscriber too slow");
        emit(
            Event::new("pubsub.dropped_message", Severity::Warn)
                .with_field("queue_bound", ring.bound),
        );
    }
    queue.push_back(msg);
    ring.notify.notify_one();
}

/// Interprets a decoded push frame as a pub/sub delivery. Frames that
/// don't match a known push shape (keyspace invalidation, unexpected
/// arity) are dropped rather than surfaced as protocol errors — they
/// are out-of-band by definition.
fn decode_push(frame: PushFrame) -> Option<PushMessage> {
    let items = frame.0;
    let kind_tag = items.first()?.as_bytes()?;
    match kind_tag {
        b"message" if items.len() >= 3 => Some(PushMessage {
            kind: PushKind::Message,
            channel: bytes_of(&items[1])?,
            pattern: None,
            payload: bytes_of(&items[2])?,
        }),
        b"pmessage" if items.len() >= 4 => Some(PushMessage {
            kind: PushKind::PMessage,
            pattern: Some(bytes_of(&items[1])?),
            channel: bytes_of(&items[2])?,
            payload: bytes_of(&items[3])?,
        }),
        b"smessage" if items.len() >= 3 => Some(PushMessage {
            kind: PushKind::SMessage,
            channel: bytes_of(&items[1])?,
            pattern: None,
            payload: bytes_of(&items[2])?,
        }),
        _ => Some(PushMessage {
            kind: PushKind::Other,
            channel: Vec::new(),
            pattern: None,
            payload: Vec::new(),
        }),
    }
}

fn bytes_of(v: &Value) -> Option<Vec<u8>> {
    v.as_bytes().map(|b| b.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn decodes_message_frame() {
        let frame = PushFrame(vec![bulk("message"), bulk("news"), bulk("hello")]);
        let msg = decode_push(frame).unwrap();
        assert_eq!(msg.kind, PushKind::Message);
        assert_eq!(msg.channel, b"news");
        assert_eq!(msg.payload, b"hello");
    }

    #[test]
    fn decodes_pmessage_frame_with_pattern() {
        let frame = PushFrame(vec![bulk("pmessage"), bulk("news.*"), bulk("news.sports"), bulk("x")]);
        let msg = decode_push(frame).unwrap();
        assert_eq!(msg.kind, PushKind::PMessage);
        assert_eq!(msg.pattern.as_deref(), Some(b"news.*".as_slice()));
        assert_eq!(msg.channel, b"news.sports");
    }

    #[tokio::test]
    async fn drops_oldest_when_bound_exceeded() {
        let ring = Ring {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            bound: 2,
        };
        for i in 0..3 {
            push_with_backpressure(
                &ring,
                PushMessage {
                    kind: PushKind::Message,
                    channel: b"c".to_vec(),
                    pattern: None,
                    payload: vec![i],
                },
            );
        }
        let queue = ring.queue.lock();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].payload, vec![1]);
        assert_eq!(queue[1].payload, vec![2]);
    }

    #[tokio::test]
    async fn delivers_messages_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        spawn(
            rx,
            Arc::new(move |m: PushMessage| received2.lock().push(m.payload)),
            DEFAULT_QUEUE_BOUND,
        );
        tx.send(PushFrame(vec![bulk("message"), bulk("c"), bulk("a")])).unwrap();
        tx.send(PushFrame(vec![bulk("message"), bulk("c"), bulk("b")])).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let got = received.lock();
        assert_eq!(*got, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
