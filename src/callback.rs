//! Out-of-band delivery of proxy-granting tickets.
//!
//! A validating service that asks for proxy rights receives only an IOU.
//! The real proxy-granting ticket travels to its callback URL through a
//! [`ProxyCallback`]; if delivery fails the ticket is discarded.

use parking_lot::Mutex;
use url::Url;

use crate::secret::Secret;

/// Why a callback delivery failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    /// The callback endpoint could not be reached.
    #[error("callback endpoint unreachable: {0}")]
    Unreachable(String),

    /// The endpoint answered but refused the ticket.
    #[error("callback endpoint rejected delivery with status {0}")]
    Rejected(u16),
}

/// Delivers a proxy-granting ticket and its IOU to a callback URL.
pub trait ProxyCallback: Send + Sync {
    /// Delivers the pair. Returning `Ok` means the endpoint accepted it.
    fn deliver(
        &self,
        callback_url: &Url,
        pgt: &Secret<String>,
        pgt_iou: &str,
    ) -> Result<(), CallbackError>;
}

/// A delivered proxy-granting ticket, as seen by [`RecordingCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Callback URL
    pub callback_url: String,
    /// Real proxy-granting ticket value
    pub pgt: String,
    /// IOU handed to the validating service
    pub pgt_iou: String,
}

/// In-memory [`ProxyCallback`] that records deliveries.
///
/// Stands in for the HTTP client in tests and single-process deployments
/// where the proxying service polls for its tickets.
///
/// # Example
///
/// ```
/// use cas_core::{ProxyCallback, RecordingCallback, Secret};
/// use url::Url;
///
/// let callback = RecordingCallback::new();
/// let url = Url::parse("https://svc1/cb").unwrap();
/// callback
///     .deliver(&url, &Secret::from("PGT-1"), "PGTIOU-1")
///     .unwrap();
///
/// assert_eq!(callback.pgt_for_iou("PGTIOU-1").as_deref(), Some("PGT-1"));
/// ```
#[derive(Debug, Default)]
pub struct RecordingCallback {
    deliveries: Mutex<Vec<Delivery>>,
    reject: Mutex<bool>,
}

impl RecordingCallback {
    /// Creates a callback that accepts every delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a callback that refuses every delivery.
    pub fn rejecting() -> Self {
        let callback = Self::default();
        callback.set_rejecting(true);
        callback
    }

    /// Switches between accepting and refusing deliveries.
    pub fn set_rejecting(&self, reject: bool) {
        *self.reject.lock() = reject;
    }

    /// Returns every accepted delivery.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Resolves an IOU to the delivered proxy-granting ticket.
    pub fn pgt_for_iou(&self, iou: &str) -> Option<String> {
        self.deliveries
            .lock()
            .iter()
            .find(|d| d.pgt_iou == iou)
            .map(|d| d.pgt.clone())
    }
}

impl ProxyCallback for RecordingCallback {
    fn deliver(
        &self,
        callback_url: &Url,
        pgt: &Secret<String>,
        pgt_iou: &str,
    ) -> Result<(), CallbackError> {
        if *self.reject.lock() {
            return Err(CallbackError::Rejected(403));
        }
        self.deliveries.lock().push(Delivery {
            callback_url: callback_url.to_string(),
            pgt: pgt.expose_secret().clone(),
            pgt_iou: pgt_iou.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://svc1/cb").unwrap()
    }

    #[test]
    fn records_deliveries() {
        let callback = RecordingCallback::new();
        callback
            .deliver(&url(), &Secret::from("PGT-a"), "PGTIOU-a")
            .unwrap();
        callback
            .deliver(&url(), &Secret::from("PGT-b"), "PGTIOU-b")
            .unwrap();

        assert_eq!(callback.deliveries().len(), 2);
        assert_eq!(callback.pgt_for_iou("PGTIOU-b").as_deref(), Some("PGT-b"));
        assert_eq!(callback.pgt_for_iou("PGTIOU-z"), None);
    }

    #[test]
    fn rejecting_records_nothing() {
        let callback = RecordingCallback::rejecting();
        let err = callback
            .deliver(&url(), &Secret::from("PGT-a"), "PGTIOU-a")
            .unwrap_err();

        assert_eq!(err, CallbackError::Rejected(403));
        assert!(callback.deliveries().is_empty());

        callback.set_rejecting(false);
        assert!(callback
            .deliver(&url(), &Secret::from("PGT-a"), "PGTIOU-a")
            .is_ok());
    }
}
