//! Login tickets: one anti-replay token per login form render.

use crate::context::TicketContext;
use crate::error::TicketError;
use crate::ticket::{Ticket, TicketBody, TicketKind};

/// Issues and checks login tickets.
///
/// A login ticket binds one rendered login form to one submission. Callers
/// should issue a fresh ticket after every submission, accepted or not, so
/// the next form render always carries a usable token.
pub struct LoginTickets<'a> {
    ctx: &'a TicketContext,
}

impl<'a> LoginTickets<'a> {
    pub(crate) fn new(ctx: &'a TicketContext) -> Self {
        Self { ctx }
    }

    /// Issues a login ticket. Login tickets have no owner.
    pub fn generate(&self) -> Result<Ticket, TicketError> {
        let now = self.ctx.now();
        let ticket = Ticket::new(
            "",
            now,
            self.ctx.expiry(now, self.ctx.tickets.login_ticket_ttl())?,
            TicketBody::Login,
        );
        let ticket = self
            .ctx
            .store
            .create(ticket)
            .map_err(|e| self.ctx.store_fault("create login ticket", e))?;
        tracing::debug!(ticket = %ticket.id().redacted(), "issued login ticket");
        Ok(ticket)
    }

    /// Consumes a login ticket.
    ///
    /// # Errors
    ///
    /// `INVALID_TICKET` if the value is malformed, unknown, already used, or
    /// expired.
    pub fn validate(&self, value: &str) -> Result<Ticket, TicketError> {
        self.ctx
            .consume(value, &[TicketKind::Login], TicketKind::Login)
    }
}
