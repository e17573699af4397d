use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::event::Event;

/// Result of waiting on a mailbox.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    Event(Event),
    TimedOut,
    /// The owning client entry was evicted while waiting.
    Closed,
}

/// Rejected deposit. The event is handed back to the caller untouched.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DepositError {
    #[error("mailbox already holds an undelivered event")]
    Full(Event),
    #[error("mailbox is closed")]
    Closed(Event),
}

#[derive(Default)]
struct Slot {
    pending: Option<Event>,
    closed: bool,
}

/// Single-slot event holder for one client.
///
/// Deposits never block: a second deposit while an event is pending is
/// rejected and the pending event is kept. Consumption happens in
/// [`Mailbox::recv_timeout`], which waits outside any registry lock.
#[derive(Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to place an event in the empty slot.
    pub fn try_deposit(&self, event: Event) -> Result<(), DepositError> {
        {
            let mut slot = self.slot.lock();
            if slot.closed {
                return Err(DepositError::Closed(event));
            }
            if slot.pending.is_some() {
                return Err(DepositError::Full(event));
            }
            slot.pending = Some(event);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Wait up to `wait` for an event and consume it.
    ///
    /// A pending event is returned even if the mailbox has been closed since
    /// it was deposited.
    pub async fn recv_timeout(&self, wait: Duration) -> Received {
        let deadline = Instant::now() + wait;
        loop {
            // Register interest before checking the slot so a deposit landing
            // between the check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut slot = self.slot.lock();
                if let Some(event) = slot.pending.take() {
                    return Received::Event(event);
                }
                if slot.closed {
                    return Received::Closed;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Received::TimedOut;
            }
        }
    }

    /// Close the mailbox and wake every waiter. Further deposits fail.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}
