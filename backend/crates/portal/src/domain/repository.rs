//! Repository Traits
//!
//! Interfaces for portal data persistence. Implementations live in the
//! infrastructure layer.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::{Document, Invoice, Message};
use crate::domain::value_objects::{ClientContact, InvoiceStatus};
use crate::error::PortalResult;

/// Document repository trait
#[trait_variant::make(DocumentRepository: Send)]
pub trait LocalDocumentRepository {
    /// Persist a new document record
    async fn create(&self, document: &Document) -> PortalResult<()>;

    /// Get a document by id
    async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Document>>;

    /// List a user's documents, newest first
    async fn list_by_owner(&self, owner_id: i64) -> PortalResult<Vec<Document>>;

    /// Delete a document; returns false if it did not exist
    async fn delete(&self, id: Uuid) -> PortalResult<bool>;
}

/// Message repository trait
#[trait_variant::make(MessageRepository: Send)]
pub trait LocalMessageRepository {
    /// Persist a new message
    async fn create(&self, message: &Message) -> PortalResult<()>;

    /// Get a message by id
    async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Message>>;

    /// List messages where the user is sender or recipient, newest first
    async fn list_for_participant(&self, user_id: i64) -> PortalResult<Vec<Message>>;

    /// Set the read timestamp and return the one now stored
    ///
    /// Only fills a null `read_at`; a later call gets the timestamp the
    /// first write persisted. `None` means the message did not exist.
    async fn mark_read(
        &self,
        id: Uuid,
        read_at: DateTime<Utc>,
    ) -> PortalResult<Option<DateTime<Utc>>>;
}

/// Invoice repository trait
#[trait_variant::make(InvoiceRepository: Send)]
pub trait LocalInvoiceRepository {
    /// Persist a new invoice
    ///
    /// Fails with `DuplicateInvoiceNumber` when the generated number
    /// collides with an existing row.
    async fn create(&self, invoice: &Invoice) -> PortalResult<()>;

    /// Get an invoice by id
    async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Invoice>>;

    /// Get an invoice by its invoice number
    async fn find_by_number(&self, invoice_number: &str) -> PortalResult<Option<Invoice>>;

    /// List a client's invoices, newest first
    async fn list_by_client(&self, client_id: i64) -> PortalResult<Vec<Invoice>>;

    /// Apply a status transition as a conditional single-row update
    ///
    /// The row is only touched while it still holds `from`, so two racing
    /// writers cannot double-apply; the loser sees `None` and re-reads.
    /// Moving to `Sent` stamps `sent_at`, moving to `Paid` stamps `paid_at`.
    async fn transition(
        &self,
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> PortalResult<Option<Invoice>>;
}

/// Read-only view of portal users, backed by the shared users table
#[trait_variant::make(UserDirectory: Send)]
pub trait LocalUserDirectory {
    /// Check whether an active user with this id exists
    async fn exists(&self, user_id: i64) -> PortalResult<bool>;

    /// Get a user's contact details for outbound notifications
    async fn contact(&self, user_id: i64) -> PortalResult<Option<ClientContact>>;
}
