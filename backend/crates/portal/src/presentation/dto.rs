//! API DTOs (Data Transfer Objects)
//!
//! Timestamps cross the wire as epoch milliseconds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{Document, Invoice, Message};

// ============================================================================
// Documents
// ============================================================================

/// Request for POST /api/portal/documents
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDocumentRequest {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub category: String,
}

/// Query for GET /api/portal/documents
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsQuery {
    /// Admins may list another user's documents
    pub user_id: Option<i64>,
}

/// Document representation
///
/// The storage key stays server-side; clients address documents by id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub owner_id: i64,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub category: String,
    pub created_at: i64,
}

impl From<&Document> for DocumentResponse {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            owner_id: document.owner_id,
            filename: document.filename.clone(),
            content_type: document.content_type.clone(),
            size_bytes: document.size_bytes,
            category: document.category.clone(),
            created_at: document.created_at.timestamp_millis(),
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Request for POST /api/portal/messages
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
}

/// Message representation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            subject: message.subject.clone(),
            body: message.body.clone(),
            read_at: message.read_at.map(|t| t.timestamp_millis()),
            created_at: message.created_at.timestamp_millis(),
        }
    }
}

// ============================================================================
// Invoices
// ============================================================================

/// Request for POST /api/portal/admin/invoices
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: i64,
    pub amount_cents: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Epoch milliseconds
    #[serde(default)]
    pub due_date: Option<i64>,
}

/// Query for GET /api/portal/admin/invoices
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvoicesQuery {
    pub client_id: i64,
}

/// Invoice representation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub client_id: i64,
    pub invoice_number: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub description: String,
    pub due_date: Option<i64>,
    pub sent_at: Option<i64>,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id,
            client_id: invoice.client_id,
            invoice_number: invoice.invoice_number.clone(),
            amount_cents: invoice.amount_cents,
            currency: invoice.currency.clone(),
            status: invoice.status.code().to_string(),
            description: invoice.description.clone(),
            due_date: invoice.due_date.map(|t| t.timestamp_millis()),
            sent_at: invoice.sent_at.map(|t| t.timestamp_millis()),
            paid_at: invoice.paid_at.map(|t| t.timestamp_millis()),
            created_at: invoice.created_at.timestamp_millis(),
            updated_at: invoice.updated_at.timestamp_millis(),
        }
    }
}

// ============================================================================
// Payment Webhook
// ============================================================================

/// Payment provider event body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookEvent {
    pub event_type: String,
    pub invoice_number: String,
    pub amount_cents: i64,
}

/// Acknowledgement returned to the payment provider
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAckResponse {
    pub received: bool,
    pub outcome: String,
}
