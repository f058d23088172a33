//! Domain event bus
//!
//! Tasks publish exactly one terminal event per execution. Subscribers drain
//! events on their own task and marshal to other threads themselves.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::types::{
    AccountId, BookId, LoginError, LogoutError, ProfileError, ProfileId, ProfilePreferences,
    RevokeError,
};

/// Account lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AccountEvent {
    CreationSucceeded {
        account_id: AccountId,
        provider_id: String,
    },
    CreationFailed {
        provider_id: String,
        message: String,
    },
    DeletionSucceeded {
        account_id: AccountId,
        provider_id: String,
    },
    DeletionFailed {
        account_id: AccountId,
        message: String,
    },
    LoginSucceeded {
        account_id: AccountId,
    },
    LoginFailed {
        account_id: AccountId,
        error: Option<LoginError>,
        message: String,
    },
    LogoutSucceeded {
        account_id: AccountId,
    },
    LogoutFailed {
        account_id: AccountId,
        error: Option<LogoutError>,
        message: String,
    },
}

impl AccountEvent {
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Self::CreationFailed { .. } => None,
            Self::CreationSucceeded { account_id, .. }
            | Self::DeletionSucceeded { account_id, .. }
            | Self::DeletionFailed { account_id, .. }
            | Self::LoginSucceeded { account_id }
            | Self::LoginFailed { account_id, .. }
            | Self::LogoutSucceeded { account_id }
            | Self::LogoutFailed { account_id, .. } => Some(*account_id),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::CreationFailed { .. }
                | Self::DeletionFailed { .. }
                | Self::LoginFailed { .. }
                | Self::LogoutFailed { .. }
        )
    }
}

/// Book events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BookEvent {
    RevokeSucceeded {
        account_id: AccountId,
        book_id: BookId,
    },
    RevokeFailed {
        account_id: AccountId,
        book_id: BookId,
        error: Option<RevokeError>,
        message: String,
    },
}

impl BookEvent {
    #[must_use]
    pub fn book_id(&self) -> &BookId {
        match self {
            Self::RevokeSucceeded { book_id, .. } | Self::RevokeFailed { book_id, .. } => book_id,
        }
    }
}

/// Outcome of a profile display name or preferences update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ProfileUpdated {
    Succeeded {
        profile_id: ProfileId,
        old_display_name: String,
        new_display_name: String,
        old_preferences: ProfilePreferences,
        new_preferences: ProfilePreferences,
    },
    Failed {
        /// `None` when no profile was requested and none is selected
        profile_id: Option<ProfileId>,
        error: ProfileError,
    },
}

impl ProfileUpdated {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Whether the reader preferences differ before and after the update.
    #[must_use]
    pub fn changed_reader_preferences(&self) -> bool {
        match self {
            Self::Succeeded {
                old_preferences,
                new_preferences,
                ..
            } => old_preferences.reader != new_preferences.reader,
            Self::Failed { .. } => false,
        }
    }
}

/// Profile events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProfileEvent {
    CreationSucceeded {
        profile_id: ProfileId,
        display_name: String,
    },
    CreationFailed {
        display_name: String,
        error: ProfileError,
    },
    Selected {
        profile_id: ProfileId,
    },
    Updated(ProfileUpdated),
}

/// Multi-producer, multi-consumer event channel.
#[derive(Debug, Clone)]
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Never blocks; succeeds with no subscribers.
    pub fn publish(&self, event: E) {
        if self.sender.send(event).is_err() {
            log::trace!("event published with no subscribers");
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> EventSubscription<E> {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving end of an [`EventBus`].
#[derive(Debug)]
pub struct EventSubscription<E> {
    receiver: broadcast::Receiver<E>,
}

impl<E: Clone> EventSubscription<E> {
    /// Wait for the next event. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<E> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("event subscriber lagged, {skipped} events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published event, without waiting.
    pub fn try_next(&mut self) -> Option<E> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("event subscriber lagged, {skipped} events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Every event published so far and not yet received.
    pub fn drain(&mut self) -> Vec<E> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
