//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Control`] | Fixed-cadence [`ControlCommand`][teleop_types::ControlCommand] frames |
//! | [`Topic::SystemAlerts`] | Operator shutdown requests |

use futures_util::stream::{self, BoxStream};
use teleop_types::{Event, TeleopError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 64;

/// All routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Control commands produced by the publisher loop.
    Control,
    /// Process-level events such as an operator Ctrl-C.
    SystemAlerts,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    control: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently and is
    /// raised to 1 if zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (control, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            control,
            system_alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when no subscribers are currently listening on the
    /// topic (this is a normal condition, not an error).
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, TeleopError> {
        let sender = self.topic_sender(topic);
        if sender.receiver_count() == 0 {
            return Ok(0);
        }
        sender.send(event).map_err(|e| {
            TeleopError::Channel(format!("send on topic {topic:?} failed: {e}"))
        })
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Control => &self.control,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Turn the receiver into a stream that skips over lag gaps and ends when
    /// the bus is dropped.
    pub fn into_stream(self) -> BoxStream<'static, Event> {
        Box::pin(stream::unfold(self, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(topic = ?rx.topic, lagged_by = n, "TopicReceiver lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use teleop_types::{ControlCommand, ControlState, EventPayload};

    fn make_event(speed: f64) -> Event {
        Event::new(
            "/apollo/control",
            EventPayload::Control(ControlCommand::from_state(
                ControlState::new(speed, 0.0),
                "test",
                1,
            )),
        )
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Control);
        let mut subscriber2 = bus.subscribe_to(Topic::Control);

        let event = make_event(0.1);
        assert_eq!(bus.publish_to(Topic::Control, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        let delivered = bus.publish_to(Topic::Control, make_event(0.0)).unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = EventBus::new(0);
        let _rx = bus.subscribe_to(Topic::Control);
        assert_eq!(bus.publish_to(Topic::Control, make_event(0.0)).unwrap(), 1);
    }

    /// A subscriber on `SystemAlerts` must not receive events published to
    /// `Control`.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts_sub = bus.subscribe_to(Topic::SystemAlerts);
        let _control_sub = bus.subscribe_to(Topic::Control);

        bus.publish_to(Topic::Control, make_event(1.0))?;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            alerts_sub.recv(),
        )
        .await;
        assert!(result.is_err(), "SystemAlerts subscriber must not receive a Control event");
        assert_eq!(alerts_sub.topic(), Topic::SystemAlerts);
        Ok(())
    }

    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(4);
        let mut slow_sub = bus.subscribe_to(Topic::Control);

        for i in 0..32 {
            let _ = bus.publish_to(Topic::Control, make_event(f64::from(i)));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn stream_skips_lag_and_ends_on_close() {
        let bus = EventBus::new(2);
        let stream = bus.subscribe_to(Topic::Control).into_stream();

        for i in 0..5 {
            bus.publish_to(Topic::Control, make_event(f64::from(i))).unwrap();
        }
        drop(bus);

        let events: Vec<Event> = stream.collect().await;
        // Only the last `capacity` events survive the lag.
        assert_eq!(events.len(), 2);
        match &events[1].payload {
            EventPayload::Control(cmd) => assert_eq!(cmd.speed, 4.0),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::Control), 0);
        let rx = bus.subscribe_to(Topic::Control);
        assert_eq!(bus.subscriber_count(Topic::Control), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::Control), 0);
    }
}
