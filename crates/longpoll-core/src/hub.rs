use std::sync::Arc;

use crate::config::HubConfig;
use crate::errors::HubError;
use crate::event::Event;
use crate::ids::ClientId;
use crate::mailbox::{DepositError, Mailbox, Received};
use crate::registry::ClientRegistry;

/// How a poll ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Delivered(Event),
    TimedOut,
    /// The client was swept while the poll was waiting.
    Evicted,
}

impl PollOutcome {
    /// Label used for logging/metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered(_) => "delivered",
            Self::TimedOut => "timed_out",
            Self::Evicted => "evicted",
        }
    }
}

/// Poll and publish entry points over a shared [`ClientRegistry`].
pub struct EventHub {
    registry: Arc<ClientRegistry>,
    config: HubConfig,
}

impl EventHub {
    pub fn new(config: HubConfig) -> Self {
        Self::with_registry(Arc::new(ClientRegistry::new()), config)
    }

    pub fn with_registry(registry: Arc<ClientRegistry>, config: HubConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a client ahead of its first poll. Idempotent; refreshes
    /// activity on an existing entry.
    pub fn subscribe(&self, client_id: &ClientId) -> bool {
        let (_, created) = self.registry.get_or_create(client_id);
        created
    }

    /// Wait for the next event addressed to `client_id`.
    ///
    /// Creates the client entry on first use. The wait happens on the
    /// client's own mailbox, never under the registry lock.
    pub async fn poll(&self, client_id: &ClientId) -> PollOutcome {
        let (mailbox, _) = self.registry.get_or_create(client_id);

        match mailbox.recv_timeout(self.config.poll_timeout).await {
            Received::Event(event) => PollOutcome::Delivered(event),
            Received::TimedOut => {
                tracing::debug!(client_id = %client_id, "Poll timeout");
                PollOutcome::TimedOut
            }
            Received::Closed => {
                tracing::debug!(client_id = %client_id, "Poll ended by eviction");
                PollOutcome::Evicted
            }
        }
    }

    /// Hand `message` to a subscribed client without blocking.
    ///
    /// Never creates an entry. A pending undelivered event wins; the new one
    /// is dropped and the caller gets [`HubError::MailboxFull`].
    pub fn publish(
        &self,
        client_id: &ClientId,
        message: impl Into<String>,
    ) -> Result<Event, HubError> {
        let mailbox = self
            .registry
            .lookup(client_id)
            .ok_or(HubError::ClientNotFound)?;
        deposit(client_id, &mailbox, message.into())
    }
}

/// Stamp and deposit one event into a looked-up mailbox.
fn deposit(client_id: &ClientId, mailbox: &Mailbox, message: String) -> Result<Event, HubError> {
    let event = Event::new(message);
    match mailbox.try_deposit(event.clone()) {
        Ok(()) => Ok(event),
        Err(DepositError::Full(_)) => {
            tracing::warn!(client_id = %client_id, "Client mailbox full, skipping event");
            Err(HubError::MailboxFull)
        }
        // Evicted between lookup and deposit.
        Err(DepositError::Closed(_)) => Err(HubError::ClientNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    fn id(raw: &str) -> ClientId {
        ClientId::parse(raw).unwrap()
    }

    fn hub() -> Arc<EventHub> {
        Arc::new(EventHub::new(HubConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_creates_entry_and_times_out() {
        let hub = hub();
        let start = Instant::now();

        let outcome = hub.poll(&id("b")).await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));
        assert_eq!(hub.registry().len(), 1);
    }

    #[tokio::test]
    async fn publish_then_poll_delivers() {
        let hub = hub();
        assert!(hub.subscribe(&id("a")));

        let published_at = chrono::Utc::now();
        let event = hub.publish(&id("a"), "hello").unwrap();

        let outcome = hub.poll(&id("a")).await;
        match outcome {
            PollOutcome::Delivered(got) => {
                assert_eq!(got, event);
                assert_eq!(got.message, "hello");
                assert!(got.time >= published_at);
            }
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_poll_receives_later_publish() {
        let hub = hub();
        hub.subscribe(&id("a"));

        let poller = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.poll(&id("a")).await })
        };
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(3)).await;
        let published_at = chrono::Utc::now();
        hub.publish(&id("a"), "hi").unwrap();

        match poller.await.unwrap() {
            PollOutcome::Delivered(event) => {
                assert_eq!(event.message, "hi");
                assert!(event.time >= published_at);
            }
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_publish_rejected_first_kept() {
        let hub = hub();
        hub.subscribe(&id("a"));

        hub.publish(&id("a"), "first").unwrap();
        assert_eq!(hub.publish(&id("a"), "second"), Err(HubError::MailboxFull));

        match hub.poll(&id("a")).await {
            PollOutcome::Delivered(event) => assert_eq!(event.message, "first"),
            other => panic!("expected delivery, got {other:?}"),
        }
        // Slot is free again.
        assert!(hub.publish(&id("a"), "third").is_ok());
    }

    #[test]
    fn publish_to_unknown_client_creates_nothing() {
        let hub = hub();
        assert_eq!(hub.publish(&id("nobody"), "x"), Err(HubError::ClientNotFound));
        assert!(hub.registry().is_empty());
    }

    #[test]
    fn publish_does_not_refresh_activity() {
        let hub = hub();
        hub.subscribe(&id("a"));
        let before = hub.registry().last_seen(&id("a")).unwrap();
        hub.publish(&id("a"), "x").unwrap();
        assert_eq!(hub.registry().last_seen(&id("a")).unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_unblocks_waiting_poll() {
        let hub = hub();
        let poller = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.poll(&id("a")).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(hub.registry().len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(hub.registry().evict_idle(Duration::from_secs(1)), 1);

        assert_eq!(poller.await.unwrap(), PollOutcome::Evicted);
        assert_eq!(hub.publish(&id("a"), "late"), Err(HubError::ClientNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn publish_racing_eviction_reports_not_found() {
        let hub = hub();
        hub.subscribe(&id("a"));
        let mailbox = hub.registry().lookup(&id("a")).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(hub.registry().evict_idle(Duration::from_secs(1)), 1);

        // Lookup already succeeded; the deposit lands on the closed mailbox.
        assert_eq!(
            deposit(&id("a"), &mailbox, "late".into()),
            Err(HubError::ClientNotFound)
        );
        assert!(!mailbox.has_pending());
        assert!(!hub.registry().contains(&id("a")));
    }

    #[test]
    fn deposit_into_full_mailbox_reports_full() {
        let mailbox = Mailbox::new();
        deposit(&id("a"), &mailbox, "first".into()).unwrap();
        assert_eq!(
            deposit(&id("a"), &mailbox, "second".into()),
            Err(HubError::MailboxFull)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_polls_share_one_entry() {
        let hub = hub();
        let polls = (0..8).map(|_| {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.poll(&id("same")).await })
        });
        let outcomes = futures::future::join_all(polls).await;

        assert_eq!(hub.registry().len(), 1);
        assert!(outcomes
            .into_iter()
            .all(|o| o.unwrap() == PollOutcome::TimedOut));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(PollOutcome::Delivered(Event::new("x")).as_str(), "delivered");
        assert_eq!(PollOutcome::TimedOut.as_str(), "timed_out");
        assert_eq!(PollOutcome::Evicted.as_str(), "evicted");
    }
}
