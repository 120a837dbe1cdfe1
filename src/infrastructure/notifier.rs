use crate::domain::notification::Notification;
use crate::domain::ports::NotificationSink;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Fans notifications out to subscribers, each with its own unbounded `tokio` channel.
///
/// A notification counts as accepted only if at least one live subscriber received it.
/// Subscribers never lose entries by falling behind; a dropped receiver is pruned on
/// the next publish.
#[derive(Clone, Default)]
pub struct BroadcastNotifier {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<Notification>>>>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }
}

impl NotificationSink for BroadcastNotifier {
    fn publish(&self, notification: Notification) -> bool {
        let name = notification.name();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| sender.send(notification.clone()).is_ok());

        if subscribers.is_empty() {
            tracing::debug!(notification = name, "no subscriber for notification");
            false
        } else {
            tracing::debug!(notification = name, receivers = subscribers.len(), "published notification");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscriber_is_rejected() {
        let notifier = BroadcastNotifier::default();
        assert!(!notifier.publish(Notification::InitFailed("NoProductsAvailable".into())));
    }

    #[tokio::test]
    async fn test_subscriber_receives_notification() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();

        assert!(notifier.publish(Notification::InitFailed("AppNotKnown".into())));
        let received = rx.recv().await.unwrap();
        assert_eq!(received, Notification::InitFailed("AppNotKnown".into()));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_stops_accepting() {
        let notifier = BroadcastNotifier::default();
        let rx = notifier.subscribe();
        drop(rx);
        assert!(!notifier.publish(Notification::InitSuccess(Vec::new())));
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_slow_subscriber_keeps_every_notification() {
        let notifier = BroadcastNotifier::default();
        let mut slow = notifier.subscribe();
        let mut fast = notifier.subscribe();

        for i in 0..500 {
            assert!(notifier.publish(Notification::InitFailed(format!("reason-{i}"))));
            assert!(fast.try_recv().is_ok());
        }

        let mut received = Vec::new();
        while let Ok(notification) = slow.try_recv() {
            received.push(notification);
        }
        assert_eq!(received.len(), 500);
        assert_eq!(received[0], Notification::InitFailed("reason-0".into()));
        assert_eq!(received[499], Notification::InitFailed("reason-499".into()));
    }
}
