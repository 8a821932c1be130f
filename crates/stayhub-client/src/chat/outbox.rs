//! Outbox of optimistic sends awaiting server confirmation.
//!
//! Entries are keyed by the client-generated correlation id and carry a
//! deadline. Owned by a single task, so no locking.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// A sent message the server has not echoed back yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub correlation_id: String,
    pub chat_id: i64,
    pub content: String,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl PendingSend {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct Outbox {
    pending: HashMap<String, PendingSend>,
    timeout: Duration,
}

impl Outbox {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Record a send made at `now`; it expires one timeout later.
    pub fn add(&mut self, correlation_id: &str, chat_id: i64, content: &str, now: Instant) {
        let entry = PendingSend {
            correlation_id: correlation_id.to_string(),
            chat_id,
            content: content.to_string(),
            created_at: now,
            expires_at: now + self.timeout,
        };
        self.pending.insert(correlation_id.to_string(), entry);
        debug!(correlation_id, chat_id, "Added pending send");
    }

    /// Remove and return an entry.
    pub fn take(&mut self, correlation_id: &str) -> Option<PendingSend> {
        let entry = self.pending.remove(correlation_id);
        if entry.is_some() {
            debug!(correlation_id, "Removed pending send");
        }
        entry
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.pending.contains_key(correlation_id)
    }

    pub fn get(&self, correlation_id: &str) -> Option<&PendingSend> {
        self.pending.get(correlation_id)
    }

    /// Remove every entry past its deadline, oldest first.
    pub fn take_expired(&mut self, now: Instant) -> Vec<PendingSend> {
        let expired: Vec<String> = self
            .pending
            .values()
            .filter(|p| p.is_expired_at(now))
            .map(|p| p.correlation_id.clone())
            .collect();

        let mut taken: Vec<PendingSend> = expired
            .iter()
            .filter_map(|id| self.pending.remove(id))
            .collect();
        taken.sort_by_key(|p| p.created_at);
        taken
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn add_and_take() {
        let mut outbox = Outbox::new(Duration::from_secs(5));
        let now = Instant::now();
        outbox.add("c-1", 5, "hi", now);

        assert!(outbox.contains("c-1"));
        assert_eq!(outbox.get("c-1").unwrap().expires_at, now + Duration::from_secs(5));

        let entry = outbox.take("c-1").unwrap();
        assert_eq!(entry.chat_id, 5);
        assert!(outbox.take("c-1").is_none());
        assert!(outbox.is_empty());
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let mut outbox = Outbox::new(Duration::from_secs(5));
        let now = Instant::now();
        outbox.add("c-1", 5, "hi", now);

        assert!(outbox.take_expired(now + Duration::from_millis(4_999)).is_empty());
        let expired = outbox.take_expired(now + Duration::from_secs(5));
        assert_eq!(expired.len(), 1);
        assert_eq!(outbox.len(), 0);
    }

    #[test]
    fn take_expired_leaves_fresh_entries_and_orders_by_age() {
        let mut outbox = Outbox::new(Duration::from_secs(5));
        let t0 = Instant::now();
        outbox.add("late", 1, "b", t0 + Duration::from_secs(1));
        outbox.add("early", 1, "a", t0);
        outbox.add("fresh", 1, "c", t0 + Duration::from_secs(4));

        let expired = outbox.take_expired(t0 + Duration::from_secs(7));
        let ids: Vec<_> = expired.iter().map(|p| p.correlation_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert!(outbox.contains("fresh"));
    }
}
