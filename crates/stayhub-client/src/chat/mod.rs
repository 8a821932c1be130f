//! Real-time chat synchronization.
//!
//! [`ChatSync`] keeps a deduplicated, receipt-ordered view of each chat
//! while optimistic local sends and server broadcasts interleave.
//! [`ChatSyncTask`] owns it and is driven through a [`ChatHandle`].

mod error;
mod events;
mod outbox;
mod sync;
mod task;

pub use error::ChatError;
pub use events::ChatEvent;
pub use outbox::{Outbox, PendingSend};
pub use sync::{ChatConfig, ChatSync, DeliveryState, LocalMessage, Reconciled};
pub use task::{ChatCommand, ChatHandle, ChatSnapshot, ChatSyncTask};
