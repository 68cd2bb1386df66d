//! Domain Entities
//!
//! Core business entities for the client portal domain.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::value_objects::InvoiceStatus;

/// Document entity - upload metadata for a file held on behalf of a client
///
/// Only the metadata lives here; the file body sits behind the opaque
/// `storage_key`.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: i64,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub category: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document record
    pub fn new(
        owner_id: i64,
        filename: String,
        content_type: String,
        size_bytes: i64,
        category: String,
        storage_key: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            filename,
            content_type,
            size_bytes,
            category,
            storage_key,
            created_at: Utc::now(),
        }
    }
}

/// Message entity - one secure message between two portal users
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new unread message
    pub fn new(sender_id: i64, recipient_id: i64, subject: String, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            recipient_id,
            subject,
            body,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    /// Check whether a user is one of the two participants
    pub fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }
}

/// Invoice entity - a bill issued to a client
#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: Uuid,
    pub client_id: i64,
    pub invoice_number: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a new draft invoice
    pub fn new(
        client_id: i64,
        invoice_number: String,
        amount_cents: i64,
        currency: String,
        description: String,
        due_date: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            invoice_number,
            amount_cents,
            currency,
            status: InvoiceStatus::Draft,
            description,
            due_date,
            sent_at: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
