//! Login/logout notifications.
//!
//! Fire-and-forget: a subscriber that dropped its receiver is pruned on the
//! next publish, and nothing waits for anyone to listen.

use parking_lot::Mutex;
use smol::channel::{self, Receiver, Sender};

use crate::dal_util::{EVENT_CLIENT_LOGGED_IN, EVENT_CLIENT_LOGGED_OUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::LoggedIn => EVENT_CLIENT_LOGGED_IN,
            SessionEvent::LoggedOut => EVENT_CLIENT_LOGGED_OUT,
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: SessionEvent) {
        log::debug!("event {}", event.name());
        self.subscribers.lock().retain(|tx| tx.try_send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
