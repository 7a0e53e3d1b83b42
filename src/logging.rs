use std::fmt;

/// Request-scoped logging for the transport-facing flows.
///
/// Every record carries the request id, so the lines a single login or
/// validation call produces can be correlated. Ticket values must be
/// redacted before they are formatted into a message; [`Secret`] values
/// redact themselves through their `Debug` and `Display` implementations.
///
/// [`Secret`]: crate::Secret
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
}

impl<'a> RequestLog<'a> {
    /// Creates a logger for one request.
    pub fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request id attached to every record.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs an info-level message.
    ///
    /// ```
    /// # use cas_core::{RequestLog, Secret};
    /// let log = RequestLog::new("req-1");
    /// let password = Secret::new("hunter2");
    /// log.info(format_args!("checking credentials {password:?}"));
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }
}
