//! Proxy-granting and proxy tickets.
//!
//! A service that validated a ticket with a callback URL earns a
//! proxy-granting ticket (PGT). The PGT mints proxy tickets (PTs) that the
//! proxying service presents to back-end services, which may in turn proxy
//! further. Each PGT records the services of the chain it was earned
//! through, so a PT validation can report its proxy chain even after the
//! short-lived tickets along it have been purged.

use url::Url;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome};
use crate::context::TicketContext;
use crate::error::{StoreError, TicketError};
use crate::secret::Secret;
use crate::service::check_bound_service;
use crate::ticket::{redact, Ticket, TicketBody, TicketId, TicketKind};

/// Issues proxy-granting tickets and resolves their chains.
pub struct ProxyGrantingTickets<'a> {
    ctx: &'a TicketContext,
}

impl<'a> ProxyGrantingTickets<'a> {
    pub(crate) fn new(ctx: &'a TicketContext) -> Self {
        Self { ctx }
    }

    /// Issues a PGT earned by validating `parent` (a service or proxy
    /// ticket) and delivers it to `callback_url`.
    ///
    /// The PGT expires with the session at the root of its chain. If
    /// delivery fails the PGT is destroyed again and an error is returned.
    ///
    /// # Errors
    ///
    /// - `INVALID_REQUEST` if the callback URL is unusable or delivery fails.
    /// - `INVALID_TICKET` if `parent` is not a service or proxy ticket, or
    ///   its session is gone.
    /// - `BAD_PGT` if the chain above `parent` is broken.
    pub fn issue(&self, parent: &Ticket, callback_url: &str) -> Result<Ticket, TicketError> {
        let callback = self.parse_callback(callback_url)?;
        let (root_tgt, proxies) = self.chain_of(parent)?;

        let Some(session) = self.ctx.find(root_tgt.as_str())? else {
            return Err(TicketError::NotFound {
                ticket: root_tgt.redacted(),
            });
        };

        let now = self.ctx.now();
        let ticket = Ticket::new(
            parent.owner(),
            now,
            session.expires_at(),
            TicketBody::ProxyGranting {
                iou: TicketId::generate_iou(),
                callback_url: callback.to_string(),
                parent: parent.id().clone(),
                root_tgt,
                proxies,
            },
        );
        let pgt = match self.ctx.store.create(ticket) {
            Ok(pgt) => pgt,
            Err(StoreError::ParentMissing { .. }) => {
                return Err(TicketError::BadPgt {
                    ticket: parent.id().redacted(),
                })
            }
            Err(e) => return Err(self.ctx.store_fault("create proxy-granting ticket", e)),
        };

        self.deliver(&callback, &pgt)?;
        self.ctx.audit_issued(&pgt, Some(callback.as_str()));
        Ok(pgt)
    }

    /// Returns a live PGT.
    ///
    /// # Errors
    ///
    /// `BAD_PGT` if the value is malformed, unknown, not a PGT, or expired.
    pub fn find(&self, value: &str) -> Result<Ticket, TicketError> {
        let bad = || TicketError::BadPgt {
            ticket: redact(value),
        };
        match self.ctx.find(value)? {
            Some(pgt)
                if pgt.kind() == TicketKind::ProxyGranting && !pgt.is_expired_at(self.ctx.now()) =>
            {
                Ok(pgt)
            }
            _ => Err(bad()),
        }
    }

    /// Walks from `pgt` up to the session at the root of its chain.
    ///
    /// Links are followed through the stored tickets while they exist. Once
    /// a link has been purged the walk falls back to the root recorded on the
    /// last ticket reached.
    ///
    /// # Errors
    ///
    /// `BAD_PGT` if the root session is gone, expired, or disagrees with the
    /// root recorded on `pgt`.
    pub fn resolve_chain_owner(&self, pgt: &Ticket) -> Result<Ticket, TicketError> {
        let bad = || TicketError::BadPgt {
            ticket: pgt.id().redacted(),
        };
        let Some(recorded_root) = pgt.root_tgt().cloned() else {
            return Err(bad());
        };

        let mut current = pgt.clone();
        let root = loop {
            let Some(link) = current.parent().cloned() else {
                break current.id().clone();
            };
            match self.ctx.find(link.as_str())? {
                Some(next) => current = next,
                None if link == recorded_root => return Err(bad()),
                None => break current
                    .root_tgt()
                    .cloned()
                    .unwrap_or_else(|| recorded_root.clone()),
            }
        };

        if root != recorded_root {
            tracing::error!(
                pgt = %pgt.id().redacted(),
                "proxy chain resolves to a different session than recorded"
            );
            return Err(bad());
        }

        match self.ctx.find(root.as_str())? {
            Some(tgt)
                if tgt.kind() == TicketKind::Granting && !tgt.is_expired_at(self.ctx.now()) =>
            {
                Ok(tgt)
            }
            _ => Err(bad()),
        }
    }

    fn parse_callback(&self, callback_url: &str) -> Result<Url, TicketError> {
        if callback_url.is_empty() {
            return Err(TicketError::MissingParameter("pgtUrl"));
        }
        let url = Url::parse(callback_url).map_err(|e| TicketError::InvalidParameter {
            name: "pgtUrl",
            reason: e.to_string(),
        })?;
        if self.ctx.require_https_callback && url.scheme() != "https" {
            return Err(TicketError::InvalidParameter {
                name: "pgtUrl",
                reason: "callback must use https".to_string(),
            });
        }
        Ok(url)
    }

    /// Returns the root session and the proxy chain a PGT earned through
    /// `parent` will carry, most recent proxy first.
    fn chain_of(&self, parent: &Ticket) -> Result<(TicketId, Vec<String>), TicketError> {
        match parent.body() {
            TicketBody::Service {
                service,
                granted_by_tgt,
                ..
            } => Ok((granted_by_tgt.clone(), vec![service.clone()])),
            TicketBody::Proxy {
                service,
                granted_by_pgt,
                root_tgt,
            } => {
                let upstream = self.find(granted_by_pgt.as_str())?;
                let mut proxies = Vec::with_capacity(upstream.proxies().len() + 1);
                proxies.push(service.clone());
                proxies.extend(upstream.proxies().iter().cloned());
                Ok((root_tgt.clone(), proxies))
            }
            _ => Err(TicketError::WrongKind {
                ticket: parent.id().redacted(),
                expected: TicketKind::Service,
                found: parent.kind(),
            }),
        }
    }

    fn deliver(&self, callback: &Url, pgt: &Ticket) -> Result<(), TicketError> {
        let iou = pgt.iou().map(TicketId::as_str).unwrap_or_default();
        let delivered = match &self.ctx.callback {
            Some(channel) => channel
                .deliver(callback, &Secret::new(pgt.id().as_str().to_string()), iou)
                .map_err(|e| e.to_string()),
            None => Err("no callback channel configured".to_string()),
        };
        let Err(reason) = delivered else {
            return Ok(());
        };

        tracing::warn!(
            pgt = %pgt.id().redacted(),
            callback = %callback,
            %reason,
            "proxy-granting ticket delivery failed"
        );
        self.ctx
            .store
            .destroy(pgt.id().as_str())
            .map_err(|e| self.ctx.store_fault("discard undelivered proxy-granting ticket", e))?;
        Err(TicketError::InvalidParameter {
            name: "pgtUrl",
            reason,
        })
    }
}

/// A validated proxy or service ticket with its proxy chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyValidation {
    /// The consumed ticket
    pub ticket: Ticket,
    /// Services the ticket passed through, most recent proxy first. Empty
    /// for a service ticket.
    pub proxies: Vec<String>,
}

/// Issues and validates proxy tickets.
pub struct ProxyTickets<'a> {
    ctx: &'a TicketContext,
}

impl<'a> ProxyTickets<'a> {
    pub(crate) fn new(ctx: &'a TicketContext) -> Self {
        Self { ctx }
    }

    /// Mints a proxy ticket for `target_service` from the PGT `pgt_value`.
    ///
    /// # Errors
    ///
    /// - `INVALID_REQUEST` if a parameter is missing or the service is
    ///   unparseable.
    /// - `BAD_PGT` if the PGT is unknown, expired, or was destroyed while
    ///   this call was in flight.
    pub fn issue(&self, pgt_value: &str, target_service: &str) -> Result<Ticket, TicketError> {
        if pgt_value.is_empty() {
            return Err(TicketError::MissingParameter("pgt"));
        }
        let service = self.ctx.services.normalize(target_service)?;
        let pgt = ProxyGrantingTickets::new(self.ctx).find(pgt_value)?;
        let Some(root_tgt) = pgt.root_tgt().cloned() else {
            return Err(TicketError::BadPgt {
                ticket: redact(pgt_value),
            });
        };

        let now = self.ctx.now();
        let ticket = Ticket::new(
            pgt.owner(),
            now,
            self.ctx.expiry(now, self.ctx.tickets.proxy_ticket_ttl())?,
            TicketBody::Proxy {
                service: service.clone(),
                granted_by_pgt: pgt.id().clone(),
                root_tgt,
            },
        );
        let ticket = match self.ctx.store.create(ticket) {
            Ok(ticket) => ticket,
            Err(StoreError::ParentMissing { .. }) => {
                return Err(TicketError::BadPgt {
                    ticket: redact(pgt_value),
                })
            }
            Err(e) => return Err(self.ctx.store_fault("create proxy ticket", e)),
        };

        self.ctx.audit_issued(&ticket, Some(&service));
        Ok(ticket)
    }

    /// Validates and consumes a proxy ticket, or a service ticket presented
    /// to the proxy validation endpoint.
    ///
    /// Follows the same rules as service ticket validation. Proxy tickets
    /// never come from a fresh login, so `renew` always rejects them.
    ///
    /// # Errors
    ///
    /// As [`ServiceTickets::validate`](crate::service::ServiceTickets::validate),
    /// plus `BAD_PGT` if the PGT that minted the ticket is gone.
    pub fn validate(
        &self,
        service: &str,
        ticket: &str,
        renew: bool,
    ) -> Result<ProxyValidation, TicketError> {
        let kind = TicketKind::from_value(ticket).unwrap_or(TicketKind::Proxy);
        let result = self.validate_inner(service, ticket, renew);
        match &result {
            Ok(validated) => self.ctx.auditor.emit(
                AuditEvent::new(AuditEventKind::TicketValidated, AuditOutcome::Success)
                    .with_principal(validated.ticket.owner())
                    .with_ticket(validated.ticket.kind(), validated.ticket.id().redacted())
                    .with_service(service),
            ),
            Err(err) => self.ctx.audit_rejection(err, kind, ticket, service),
        }
        result
    }

    fn validate_inner(
        &self,
        service: &str,
        ticket: &str,
        renew: bool,
    ) -> Result<ProxyValidation, TicketError> {
        if ticket.is_empty() {
            return Err(TicketError::MissingParameter("ticket"));
        }
        let presented = self.ctx.services.normalize(service)?;
        let consumed = self.ctx.consume(
            ticket,
            &[TicketKind::Proxy, TicketKind::Service],
            TicketKind::Proxy,
        )?;
        check_bound_service(self.ctx, &consumed, &presented)?;
        if renew && !consumed.is_from_new_login() {
            return Err(TicketError::NotRenewed {
                ticket: redact(ticket),
            });
        }

        let proxies = match consumed.body() {
            TicketBody::Proxy { granted_by_pgt, .. } => {
                let pgt = self.ctx.find(granted_by_pgt.as_str())?.ok_or_else(|| {
                    TicketError::BadPgt {
                        ticket: granted_by_pgt.redacted(),
                    }
                })?;
                pgt.proxies().to_vec()
            }
            _ => Vec::new(),
        };
        Ok(ProxyValidation {
            ticket: consumed,
            proxies,
        })
    }
}
