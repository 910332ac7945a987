//! Correlation of outstanding requests with their replies.
//!
//! The registry is owned by the session driver and never shared, so it needs
//! no locking. Every entry leaves the map exactly once: on its reply, on its
//! deadline, or when the session closes.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use netconf_protocol::message::reply_data_text;
use netconf_protocol::{NetconfError, NetconfResult, ReplyOutcome};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// The classified reply to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    /// Message id of the request
    pub message_id: String,
    /// `<ok/>`, data or error
    pub outcome: ReplyOutcome,
    /// Raw `<rpc-reply>`
    pub xml: String,
    /// Time between sending the request and receiving the reply
    pub elapsed: Duration,
}

impl RpcResponse {
    /// Whether the reply is `<ok/>`
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.outcome == ReplyOutcome::Ok
    }

    /// Turn an `<rpc-error>` reply into an `Rpc` error.
    ///
    /// # Errors
    ///
    /// Returns an `Rpc` error carrying the message id and reply XML when the
    /// server reported an error.
    pub fn into_result(self) -> NetconfResult<Self> {
        match &self.outcome {
            ReplyOutcome::Error { message } => Err(NetconfError::rpc(message.clone())
                .with_message_id(self.message_id.clone())
                .with_xml(self.xml)),
            _ => Ok(self),
        }
    }

    /// Text content of the reply's `<data>` element.
    ///
    /// # Errors
    ///
    /// Returns a `MalformedMessage` error when the reply is not well-formed.
    pub fn data_text(&self) -> NetconfResult<Option<String>> {
        reply_data_text(&self.xml)
    }
}

/// Callback receiving the reply of a request
pub type ReplyCallback = Box<dyn FnOnce(RpcResponse) + Send + 'static>;

/// What happens when a request resolves
pub enum Completion {
    /// Invoke a callback with the reply. Dropped uninvoked on timeout or
    /// disconnect.
    Callback(ReplyCallback),
    /// Hand the reply to a waiting task. Receives an error on timeout or
    /// disconnect.
    Waiter(oneshot::Sender<NetconfResult<RpcResponse>>),
}

impl Completion {
    /// Deliver the reply
    pub fn complete(self, response: RpcResponse) {
        match self {
            Self::Callback(callback) => callback(response),
            Self::Waiter(waiter) => {
                let _ = waiter.send(Ok(response));
            }
        }
    }

    /// Give up on the request
    pub fn abandon(self, error: NetconfError) {
        match self {
            Self::Callback(_) => {}
            Self::Waiter(waiter) => {
                let _ = waiter.send(Err(error));
            }
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Completion::Callback"),
            Self::Waiter(_) => f.write_str("Completion::Waiter"),
        }
    }
}

#[derive(Debug)]
struct PendingRequest {
    completion: Completion,
    issued_at: Instant,
    deadline: Instant,
}

/// A request removed by its reply
#[derive(Debug)]
pub struct Resolved {
    /// Completion to run with the reply
    pub completion: Completion,
    /// Time since the request was registered
    pub elapsed: Duration,
    /// Whether the registry is now empty
    pub idle: bool,
}

/// Requests removed by their deadline
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Expired {
    /// Message ids, earliest deadline first
    pub ids: Vec<String>,
    /// Whether the registry became empty
    pub idle: bool,
}

/// Longest timeout honoured; larger ones are clamped to it
const MAX_TIMEOUT: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now + timeout.min(MAX_TIMEOUT)
}

/// Pending requests keyed by message id.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    pending: HashMap<String, PendingRequest>,
}

impl RequestRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a request until `now + timeout`. Timeouts beyond thirty years
    /// are clamped.
    ///
    /// Returns whether the registry turned busy.
    ///
    /// # Errors
    ///
    /// Returns a `DuplicateMessageId` error when `id` is already pending;
    /// the existing entry is left untouched.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        completion: Completion,
        timeout: Duration,
        now: Instant,
    ) -> NetconfResult<bool> {
        let id = id.into();
        if self.pending.contains_key(&id) {
            return Err(NetconfError::duplicate_message_id(id));
        }
        let was_empty = self.pending.is_empty();
        self.pending.insert(
            id,
            PendingRequest {
                completion,
                issued_at: now,
                deadline: deadline_after(now, timeout),
            },
        );
        Ok(was_empty)
    }

    /// Remove the entry for `id`. Unknown ids return `None` and leave the
    /// busy/idle state alone.
    pub fn resolve(&mut self, id: &str, now: Instant) -> Option<Resolved> {
        let entry = self.pending.remove(id)?;
        Some(Resolved {
            completion: entry.completion,
            elapsed: now.saturating_duration_since(entry.issued_at),
            idle: self.pending.is_empty(),
        })
    }

    /// Remove every entry whose deadline has passed. Waiters receive a
    /// `Timeout` error, callbacks are dropped.
    pub fn expire(&mut self, now: Instant) -> Expired {
        let mut due: Vec<(Instant, String)> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, entry)| (entry.deadline, id.clone()))
            .collect();
        if due.is_empty() {
            return Expired::default();
        }
        due.sort();

        let mut ids = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(entry) = self.pending.remove(&id) {
                let elapsed = now.saturating_duration_since(entry.issued_at);
                entry.completion.abandon(
                    NetconfError::timeout(format!(
                        "no reply after {}",
                        format_elapsed(elapsed)
                    ))
                    .with_message_id(id.clone()),
                );
                ids.push(id);
            }
        }
        Expired {
            ids,
            idle: self.pending.is_empty(),
        }
    }

    /// Earliest deadline of any pending request
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|entry| entry.deadline).min()
    }

    /// Drop every entry. Waiters receive a `NotConnected` error, callbacks
    /// are dropped. Returns how many requests were pending.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            entry.completion.abandon(NetconfError::not_connected());
        }
        count
    }

    /// Whether `id` is pending
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of pending requests
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Render a duration in the coarsest fitting unit: `250ms`, `2.5s`,
/// `3.2min` or `1.1h`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", elapsed.as_millis())
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        format!("{:.1}min", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netconf_protocol::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> Completion {
        let counter = Arc::clone(counter);
        Completion::Callback(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn ok_reply(id: &str) -> RpcResponse {
        RpcResponse {
            message_id: id.into(),
            outcome: ReplyOutcome::Ok,
            xml: format!(r#"<rpc-reply message-id="{id}"><ok/></rpc-reply>"#),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_register_then_resolve_invokes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = RequestRegistry::new();
        let now = Instant::now();

        assert!(registry
            .register("7", counting_callback(&calls), Duration::from_secs(5), now)
            .unwrap());

        let resolved = registry
            .resolve("7", now + Duration::from_millis(40))
            .unwrap();
        assert_eq!(resolved.elapsed, Duration::from_millis(40));
        assert!(resolved.idle);
        resolved.completion.complete(ok_reply("7"));

        assert!(registry.resolve("7", now).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_id_is_a_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = RequestRegistry::new();
        let now = Instant::now();
        registry
            .register("1", counting_callback(&calls), Duration::from_secs(5), now)
            .unwrap();

        assert!(registry.resolve("2", now).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = RequestRegistry::new();
        let now = Instant::now();
        let noop = || Completion::Callback(Box::new(|_| {}));
        registry
            .register("1", noop(), Duration::from_secs(5), now)
            .unwrap();
        let err = registry
            .register("1", noop(), Duration::from_secs(5), now)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateMessageId);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_huge_timeout_is_clamped() {
        let mut registry = RequestRegistry::new();
        let now = Instant::now();
        registry
            .register("1", Completion::Callback(Box::new(|_| {})), Duration::MAX, now)
            .unwrap();
        assert_eq!(registry.next_deadline(), Some(now + MAX_TIMEOUT));
        assert!(registry.expire(now + Duration::from_secs(86_400)).ids.is_empty());
        assert!(registry.resolve("1", now).is_some());
    }

    #[test]
    fn test_busy_only_on_first_register() {
        let mut registry = RequestRegistry::new();
        let now = Instant::now();
        let noop = || Completion::Callback(Box::new(|_| {}));
        assert!(registry.register("1", noop(), Duration::from_secs(5), now).unwrap());
        assert!(!registry.register("2", noop(), Duration::from_secs(5), now).unwrap());

        assert!(!registry.resolve("1", now).unwrap().idle);
        assert!(registry.resolve("2", now).unwrap().idle);
    }

    #[test]
    fn test_expire_drops_callback_and_reports_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = RequestRegistry::new();
        let now = Instant::now();
        registry
            .register("a", counting_callback(&calls), Duration::from_secs(1), now)
            .unwrap();
        registry
            .register("b", counting_callback(&calls), Duration::from_secs(3), now)
            .unwrap();
        assert_eq!(registry.next_deadline(), Some(now + Duration::from_secs(1)));

        assert_eq!(registry.expire(now), Expired::default());

        let expired = registry.expire(now + Duration::from_secs(2));
        assert_eq!(expired.ids, vec!["a".to_string()]);
        assert!(!expired.idle);
        assert_eq!(registry.expire(now + Duration::from_secs(2)), Expired::default());

        let expired = registry.expire(now + Duration::from_secs(3));
        assert_eq!(expired.ids, vec!["b".to_string()]);
        assert!(expired.idle);

        // A late reply finds nothing.
        assert!(registry.resolve("a", now + Duration::from_secs(4)).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.next_deadline(), None);
    }

    #[tokio::test]
    async fn test_waiter_receives_timeout_error() {
        let mut registry = RequestRegistry::new();
        let now = Instant::now();
        let (tx, rx) = oneshot::channel();
        registry
            .register("9", Completion::Waiter(tx), Duration::from_millis(100), now)
            .unwrap();
        registry.expire(now + Duration::from_millis(100));

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_clear_abandons_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = RequestRegistry::new();
        let now = Instant::now();
        let (tx, rx) = oneshot::channel();
        registry
            .register("1", Completion::Waiter(tx), Duration::from_secs(5), now)
            .unwrap();
        registry
            .register("2", counting_callback(&calls), Duration::from_secs(5), now)
            .unwrap();

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::NotConnected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rpc_error_into_result() {
        let response = RpcResponse {
            message_id: "42".into(),
            outcome: ReplyOutcome::Error {
                message: "bad filter".into(),
            },
            xml: "<rpc-reply/>".into(),
            elapsed: Duration::ZERO,
        };
        let err = response.into_result().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Rpc);
        assert_eq!(err.message, "bad filter");
        assert!(ok_reply("1").into_result().is_ok());
    }

    #[test]
    fn test_format_elapsed_units() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(192)), "3.2min");
        assert_eq!(format_elapsed(Duration::from_secs(3960)), "1.1h");
    }
}
