//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{Document, Invoice, Message};
use crate::domain::repository::{
    DocumentRepository, InvoiceRepository, MessageRepository, UserDirectory,
};
use crate::domain::value_objects::{ClientContact, InvoiceStatus};
use crate::error::{PortalError, PortalResult};

/// PostgreSQL-backed portal repository
#[derive(Clone)]
pub struct PgPortalRepository {
    pool: PgPool,
}

impl PgPortalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Document Repository Implementation
// ============================================================================

impl DocumentRepository for PgPortalRepository {
    async fn create(&self, document: &Document) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (
                id,
                owner_id,
                filename,
                content_type,
                size_bytes,
                category,
                storage_key,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(document.id)
        .bind(document.owner_id)
        .bind(&document.filename)
        .bind(&document.content_type)
        .bind(document.size_bytes)
        .bind(&document.category)
        .bind(&document.storage_key)
        .bind(document.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT
                id,
                owner_id,
                filename,
                content_type,
                size_bytes,
                category,
                storage_key,
                created_at
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DocumentRow::into_document))
    }

    async fn list_by_owner(&self, owner_id: i64) -> PortalResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT
                id,
                owner_id,
                filename,
                content_type,
                size_bytes,
                category,
                storage_key,
                created_at
            FROM documents
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DocumentRow::into_document).collect())
    }

    async fn delete(&self, id: Uuid) -> PortalResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Message Repository Implementation
// ============================================================================

impl MessageRepository for PgPortalRepository {
    async fn create(&self, message: &Message) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id,
                sender_id,
                recipient_id,
                subject,
                body,
                read_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(message.read_at)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT
                id,
                sender_id,
                recipient_id,
                subject,
                body,
                read_at,
                created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn list_for_participant(&self, user_id: i64) -> PortalResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT
                id,
                sender_id,
                recipient_id,
                subject,
                body,
                read_at,
                created_at
            FROM messages
            WHERE sender_id = $1 OR recipient_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn mark_read(
        &self,
        id: Uuid,
        read_at: DateTime<Utc>,
    ) -> PortalResult<Option<DateTime<Utc>>> {
        // COALESCE keeps the first timestamp when two readers race;
        // RETURNING hands back whichever one the row holds
        let stored: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE messages
            SET read_at = COALESCE(read_at, $2)
            WHERE id = $1
            RETURNING read_at
            "#,
        )
        .bind(id)
        .bind(read_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stored)
    }
}

// ============================================================================
// Invoice Repository Implementation
// ============================================================================

impl InvoiceRepository for PgPortalRepository {
    async fn create(&self, invoice: &Invoice) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id,
                client_id,
                invoice_number,
                amount_cents,
                currency,
                invoice_status,
                description,
                due_date,
                sent_at,
                paid_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.client_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.amount_cents)
        .bind(&invoice.currency)
        .bind(invoice.status.id())
        .bind(&invoice.description)
        .bind(invoice.due_date)
        .bind(invoice.sent_at)
        .bind(invoice.paid_at)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_invoice_number_violation)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id,
                client_id,
                invoice_number,
                amount_cents,
                currency,
                invoice_status,
                description,
                due_date,
                sent_at,
                paid_at,
                created_at,
                updated_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(InvoiceRow::into_invoice).transpose()
    }

    async fn find_by_number(&self, invoice_number: &str) -> PortalResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id,
                client_id,
                invoice_number,
                amount_cents,
                currency,
                invoice_status,
                description,
                due_date,
                sent_at,
                paid_at,
                created_at,
                updated_at
            FROM invoices
            WHERE invoice_number = $1
            "#,
        )
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(InvoiceRow::into_invoice).transpose()
    }

    async fn list_by_client(&self, client_id: i64) -> PortalResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id,
                client_id,
                invoice_number,
                amount_cents,
                currency,
                invoice_status,
                description,
                due_date,
                sent_at,
                paid_at,
                created_at,
                updated_at
            FROM invoices
            WHERE client_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InvoiceRow::into_invoice).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> PortalResult<Option<Invoice>> {
        // The guard on invoice_status makes the update a no-op for every
        // writer except the first; losers get no row back.
        let sql = match to {
            InvoiceStatus::Sent => {
                r#"
                UPDATE invoices
                SET invoice_status = $2, sent_at = $3, updated_at = $3
                WHERE id = $1 AND invoice_status = $4
                RETURNING
                    id,
                    client_id,
                    invoice_number,
                    amount_cents,
                    currency,
                    invoice_status,
                    description,
                    due_date,
                    sent_at,
                    paid_at,
                    created_at,
                    updated_at
                "#
            }
            InvoiceStatus::Paid => {
                r#"
                UPDATE invoices
                SET invoice_status = $2, paid_at = $3, updated_at = $3
                WHERE id = $1 AND invoice_status = $4
                RETURNING
                    id,
                    client_id,
                    invoice_number,
                    amount_cents,
                    currency,
                    invoice_status,
                    description,
                    due_date,
                    sent_at,
                    paid_at,
                    created_at,
                    updated_at
                "#
            }
            _ => {
                r#"
                UPDATE invoices
                SET invoice_status = $2, updated_at = $3
                WHERE id = $1 AND invoice_status = $4
                RETURNING
                    id,
                    client_id,
                    invoice_number,
                    amount_cents,
                    currency,
                    invoice_status,
                    description,
                    due_date,
                    sent_at,
                    paid_at,
                    created_at,
                    updated_at
                "#
            }
        };

        let row = sqlx::query_as::<_, InvoiceRow>(sql)
            .bind(id)
            .bind(to.id())
            .bind(at)
            .bind(from.id())
            .fetch_optional(&self.pool)
            .await?;

        row.map(InvoiceRow::into_invoice).transpose()
    }
}

// ============================================================================
// User Directory Implementation
// ============================================================================

impl UserDirectory for PgPortalRepository {
    async fn exists(&self, user_id: i64) -> PortalResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND is_active = TRUE)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn contact(&self, user_id: i64) -> PortalResult<Option<ClientContact>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT email, user_name FROM users WHERE id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(email, user_name)| ClientContact { email, user_name }))
    }
}

/// Translate a unique-constraint violation on the invoice number into the
/// retryable collision error
fn map_invoice_number_violation(e: sqlx::Error) -> PortalError {
    if let sqlx::Error::Database(ref db) = e {
        if db.code().as_deref() == Some("23505")
            && db.constraint().unwrap_or_default().contains("invoice_number")
        {
            return PortalError::DuplicateInvoiceNumber;
        }
    }
    PortalError::from(e)
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    owner_id: i64,
    filename: String,
    content_type: String,
    size_bytes: i64,
    category: String,
    storage_key: String,
    created_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_document(self) -> Document {
        Document {
            id: self.id,
            owner_id: self.owner_id,
            filename: self.filename,
            content_type: self.content_type,
            size_bytes: self.size_bytes,
            category: self.category,
            storage_key: self.storage_key,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: i64,
    recipient_id: i64,
    subject: String,
    body: String,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            subject: self.subject,
            body: self.body,
            read_at: self.read_at,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    client_id: i64,
    invoice_number: String,
    amount_cents: i64,
    currency: String,
    invoice_status: i16,
    description: String,
    due_date: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self) -> PortalResult<Invoice> {
        let status = InvoiceStatus::from_id(self.invoice_status).ok_or_else(|| {
            PortalError::Internal(format!("Invalid invoice_status: {}", self.invoice_status))
        })?;

        Ok(Invoice {
            id: self.id,
            client_id: self.client_id,
            invoice_number: self.invoice_number,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status,
            description: self.description,
            due_date: self.due_date,
            sent_at: self.sent_at,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
