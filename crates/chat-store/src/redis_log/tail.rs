//! Tail subscription pump.
//!
//! Forwards change events from a dedicated pub/sub connection into the
//! subscriber's channel until either side goes away.

use std::sync::Arc;

use chat_core::{LogEvent, MessageKey, SubscriptionId};
use dashmap::DashMap;
use futures::channel::mpsc;
use futures_util::{Stream, StreamExt};
use tokio::task::AbortHandle;

/// Open tails, so `unsubscribe` can stop their pumps
pub(crate) type TailRegistry = Arc<DashMap<SubscriptionId, AbortHandle>>;

/// Decode one pub/sub payload, dropping anything that is not a log event
pub(crate) fn decode_event(payload: &str) -> Option<LogEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring undecodable change event");
            None
        }
    }
}

pub(crate) async fn pump<S>(
    id: SubscriptionId,
    messages: S,
    from: Option<MessageKey>,
    tx: mpsc::UnboundedSender<LogEvent>,
    registry: TailRegistry,
) where
    S: Stream<Item = redis::Msg> + Send,
{
    let mut messages = Box::pin(messages);

    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(subscription = %id, error = %e, "Unreadable pub/sub payload");
                continue;
            }
        };
        let Some(event) = decode_event(&payload) else {
            continue;
        };
        if matches!(event, LogEvent::Added(_)) && !event.is_at_or_after(from.as_ref()) {
            continue;
        }
        if tx.unbounded_send(event).is_err() {
            // Receiver dropped
            break;
        }
    }

    registry.remove(&id);
    tracing::debug!(subscription = %id, "Tail pump stopped");
}
