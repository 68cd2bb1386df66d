//! Invoice Use Cases
//!
//! Draft/send/void lifecycle plus payment recording from the provider
//! webhook. Status changes go through conditional single-row updates so
//! a racing webhook and admin action cannot double-apply.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use platform::mail::{MailMessage, Mailer};
use uuid::Uuid;

use crate::application::config::PortalConfig;
use crate::domain::entities::Invoice;
use crate::domain::repository::{InvoiceRepository, UserDirectory};
use crate::domain::services;
use crate::domain::value_objects::InvoiceStatus;
use crate::error::{PortalError, PortalResult};

const MAX_DESCRIPTION_LEN: usize = 1_000;

/// Attempts at a unique invoice number before giving up
const INVOICE_NUMBER_ATTEMPTS: u32 = 3;

/// Input for creating a draft invoice
#[derive(Debug, Clone)]
pub struct CreateInvoiceInput {
    pub client_id: i64,
    pub amount_cents: i64,
    /// ISO 4217 code; defaults to USD
    pub currency: Option<String>,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Outcome of a payment webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Invoice moved to paid
    Recorded,
    /// Invoice was already paid; nothing to do
    AlreadyPaid,
    /// Event type is not one we act on
    Ignored,
}

/// Invoice use cases
pub struct InvoicesUseCase<I, U, M>
where
    I: InvoiceRepository,
    U: UserDirectory,
    M: Mailer,
{
    invoices: Arc<I>,
    users: Arc<U>,
    mailer: Arc<M>,
    config: Arc<PortalConfig>,
}

impl<I, U, M> InvoicesUseCase<I, U, M>
where
    I: InvoiceRepository,
    U: UserDirectory,
    M: Mailer,
{
    pub fn new(invoices: Arc<I>, users: Arc<U>, mailer: Arc<M>, config: Arc<PortalConfig>) -> Self {
        Self {
            invoices,
            users,
            mailer,
            config,
        }
    }

    /// Create a draft invoice for a client (admin)
    pub async fn create(&self, input: CreateInvoiceInput) -> PortalResult<Invoice> {
        if input.amount_cents <= 0 {
            return Err(PortalError::Validation(
                "Invoice amount must be positive".to_string(),
            ));
        }

        if input.description.len() > MAX_DESCRIPTION_LEN {
            return Err(PortalError::Validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        let currency = match input.currency {
            Some(code) => {
                let code = code.trim().to_ascii_uppercase();
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                    return Err(PortalError::Validation(
                        "Currency must be a three-letter code".to_string(),
                    ));
                }
                code
            }
            None => "USD".to_string(),
        };

        if !self.users.exists(input.client_id).await? {
            return Err(PortalError::UserNotFound);
        }

        // The number is random, so a collision is possible; retry with a
        // fresh draw instead of failing the request.
        let mut attempt = 0;
        loop {
            let number = services::generate_invoice_number(Utc::now().year());
            let invoice = Invoice::new(
                input.client_id,
                number,
                input.amount_cents,
                currency.clone(),
                input.description.clone(),
                input.due_date,
            );

            match self.invoices.create(&invoice).await {
                Ok(()) => {
                    tracing::info!(
                        invoice_id = %invoice.id,
                        invoice_number = %invoice.invoice_number,
                        client_id = invoice.client_id,
                        "Invoice drafted"
                    );
                    return Ok(invoice);
                }
                Err(PortalError::DuplicateInvoiceNumber) => {
                    attempt += 1;
                    if attempt >= INVOICE_NUMBER_ATTEMPTS {
                        return Err(PortalError::Internal(
                            "Could not allocate a unique invoice number".to_string(),
                        ));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// List the caller's own invoices, newest first
    pub async fn list(&self, caller_id: i64) -> PortalResult<Vec<Invoice>> {
        self.invoices.list_by_client(caller_id).await
    }

    /// Get a single invoice, own-or-admin
    pub async fn get(&self, caller_id: i64, caller_is_admin: bool, id: Uuid) -> PortalResult<Invoice> {
        let invoice = self
            .invoices
            .find_by_id(id)
            .await?
            .ok_or(PortalError::InvoiceNotFound)?;

        // Non-owners get the same 404 as a missing row
        if invoice.client_id != caller_id && !caller_is_admin {
            return Err(PortalError::InvoiceNotFound);
        }

        Ok(invoice)
    }

    /// Send a draft invoice: transition draft to sent, then notify the client
    ///
    /// The transition commits before the email goes out. A mail failure
    /// surfaces as an error but the invoice stays sent; it is a
    /// notification failure, not a billing failure.
    pub async fn send(&self, id: Uuid) -> PortalResult<Invoice> {
        let invoice = self
            .invoices
            .find_by_id(id)
            .await?
            .ok_or(PortalError::InvoiceNotFound)?;

        if invoice.status != InvoiceStatus::Draft {
            return Err(PortalError::IllegalTransition {
                from: invoice.status,
                to: InvoiceStatus::Sent,
            });
        }

        let sent = self
            .transition_or_conflict(invoice.id, InvoiceStatus::Draft, InvoiceStatus::Sent)
            .await?;

        tracing::info!(
            invoice_id = %sent.id,
            invoice_number = %sent.invoice_number,
            "Invoice sent"
        );

        self.notify_client(&sent).await?;

        Ok(sent)
    }

    /// Void a draft or sent invoice
    pub async fn void(&self, id: Uuid) -> PortalResult<Invoice> {
        let invoice = self
            .invoices
            .find_by_id(id)
            .await?
            .ok_or(PortalError::InvoiceNotFound)?;

        if !invoice.status.can_transition_to(InvoiceStatus::Void) {
            return Err(PortalError::IllegalTransition {
                from: invoice.status,
                to: InvoiceStatus::Void,
            });
        }

        let voided = self
            .transition_or_conflict(invoice.id, invoice.status, InvoiceStatus::Void)
            .await?;

        tracing::info!(
            invoice_id = %voided.id,
            invoice_number = %voided.invoice_number,
            "Invoice voided"
        );

        Ok(voided)
    }

    /// Record a payment event from the provider webhook
    ///
    /// `payment.succeeded` moves the matching invoice from sent to paid.
    /// A second delivery of the same event is acknowledged without effect.
    pub async fn record_payment(
        &self,
        event_type: &str,
        invoice_number: &str,
        amount_cents: i64,
    ) -> PortalResult<PaymentOutcome> {
        if event_type != "payment.succeeded" {
            tracing::debug!(event_type, "Ignoring payment event");
            return Ok(PaymentOutcome::Ignored);
        }

        let invoice = self
            .invoices
            .find_by_number(invoice_number)
            .await?
            .ok_or(PortalError::InvoiceNotFound)?;

        if amount_cents != invoice.amount_cents {
            tracing::warn!(
                invoice_number = %invoice.invoice_number,
                expected = invoice.amount_cents,
                received = amount_cents,
                "Payment amount does not match invoice"
            );
            return Err(PortalError::AmountMismatch);
        }

        match invoice.status {
            InvoiceStatus::Paid => return Ok(PaymentOutcome::AlreadyPaid),
            InvoiceStatus::Sent => {}
            status => {
                return Err(PortalError::IllegalTransition {
                    from: status,
                    to: InvoiceStatus::Paid,
                });
            }
        }

        match self
            .invoices
            .transition(invoice.id, InvoiceStatus::Sent, InvoiceStatus::Paid, Utc::now())
            .await?
        {
            Some(paid) => {
                tracing::info!(
                    invoice_id = %paid.id,
                    invoice_number = %paid.invoice_number,
                    "Payment recorded"
                );
                Ok(PaymentOutcome::Recorded)
            }
            // Lost a race; re-read to see who won
            None => match self.invoices.find_by_id(invoice.id).await? {
                Some(current) if current.status == InvoiceStatus::Paid => {
                    Ok(PaymentOutcome::AlreadyPaid)
                }
                Some(current) => Err(PortalError::IllegalTransition {
                    from: current.status,
                    to: InvoiceStatus::Paid,
                }),
                None => Err(PortalError::InvoiceNotFound),
            },
        }
    }

    /// Apply a transition, translating a lost race into a conflict
    async fn transition_or_conflict(
        &self,
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> PortalResult<Invoice> {
        match self.invoices.transition(id, from, to, Utc::now()).await? {
            Some(updated) => Ok(updated),
            None => match self.invoices.find_by_id(id).await? {
                Some(current) => Err(PortalError::IllegalTransition {
                    from: current.status,
                    to,
                }),
                None => Err(PortalError::InvoiceNotFound),
            },
        }
    }

    /// Email the client that an invoice is ready
    async fn notify_client(&self, invoice: &Invoice) -> PortalResult<()> {
        let contact = self
            .users
            .contact(invoice.client_id)
            .await?
            .ok_or_else(|| {
                PortalError::MailDispatch("Client has no deliverable address".to_string())
            })?;

        let mut text_body = format!(
            "Hello {},\n\n\
             A new invoice is ready for you.\n\n\
             Invoice number: {}\n\
             Amount due: {}\n",
            contact.user_name,
            invoice.invoice_number,
            format_amount(invoice.amount_cents, &invoice.currency),
        );
        if let Some(due) = invoice.due_date {
            text_body.push_str(&format!("Due date: {}\n", due.format("%Y-%m-%d")));
        }
        text_body.push_str(&format!(
            "\nView and pay your invoice here:\n{}/invoices/{}\n\n\
             Thank you,\n{}\n",
            self.config.frontend_base_url, invoice.id, self.config.firm_name,
        ));

        let message = MailMessage {
            to: contact.email,
            to_name: contact.user_name,
            subject: format!(
                "Invoice {} from {}",
                invoice.invoice_number, self.config.firm_name
            ),
            text_body,
        };

        self.mailer.send(&message).await?;

        Ok(())
    }
}

/// Render cents as a decimal amount with its currency code
fn format_amount(amount_cents: i64, currency: &str) -> String {
    format!("{}.{:02} {}", amount_cents / 100, amount_cents % 100, currency)
}
