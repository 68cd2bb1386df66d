//! HTTP Handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use auth::middleware::CurrentUser;
use platform::mail::Mailer;

use crate::application::config::PortalConfig;
use crate::application::documents::{DocumentsUseCase, RecordDocumentInput};
use crate::application::invoices::{CreateInvoiceInput, InvoicesUseCase, PaymentOutcome};
use crate::application::messages::{MessagesUseCase, SendMessageInput};
use crate::domain::repository::{
    DocumentRepository, InvoiceRepository, MessageRepository, UserDirectory,
};
use crate::domain::services::verify_webhook_signature;
use crate::error::{PortalError, PortalResult};
use crate::presentation::dto::{
    CreateInvoiceRequest, DocumentResponse, InvoiceResponse, ListDocumentsQuery, ListInvoicesQuery,
    MessageResponse, PaymentWebhookEvent, RecordDocumentRequest, SendMessageRequest,
    WebhookAckResponse,
};

/// Header carrying the payment webhook signature
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Shared state for portal handlers
pub struct PortalAppState<P, M>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    pub repo: Arc<P>,
    pub mailer: Arc<M>,
    pub config: Arc<PortalConfig>,
}

// Manual impl: a derive would also demand Clone of the mailer type,
// but only the Arc handles are cloned.
impl<P, M> Clone for PortalAppState<P, M>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            mailer: Arc::clone(&self.mailer),
            config: Arc::clone(&self.config),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// POST /api/portal/documents
pub async fn record_document<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<RecordDocumentRequest>,
) -> PortalResult<impl IntoResponse>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = DocumentsUseCase::new(state.repo.clone());

    let input = RecordDocumentInput {
        filename: req.filename,
        content_type: req.content_type,
        size_bytes: req.size_bytes,
        category: req.category,
    };

    let document = use_case.record(current.user_id, input).await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(&document))))
}

/// GET /api/portal/documents
pub async fn list_documents<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListDocumentsQuery>,
) -> PortalResult<Json<Vec<DocumentResponse>>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = DocumentsUseCase::new(state.repo.clone());

    let documents = use_case
        .list(current.user_id, current.is_admin(), query.user_id)
        .await?;

    Ok(Json(documents.iter().map(DocumentResponse::from).collect()))
}

/// GET /api/portal/documents/{id}
pub async fn get_document<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> PortalResult<Json<DocumentResponse>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = DocumentsUseCase::new(state.repo.clone());

    let document = use_case.get(current.user_id, current.is_admin(), id).await?;

    Ok(Json(DocumentResponse::from(&document)))
}

/// DELETE /api/portal/documents/{id}
pub async fn delete_document<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> PortalResult<impl IntoResponse>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = DocumentsUseCase::new(state.repo.clone());

    use_case
        .delete(current.user_id, current.is_admin(), id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Messages
// ============================================================================

/// POST /api/portal/messages
pub async fn send_message<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> PortalResult<impl IntoResponse>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = MessagesUseCase::new(state.repo.clone(), state.repo.clone());

    let input = SendMessageInput {
        recipient_id: req.recipient_id,
        subject: req.subject,
        body: req.body,
    };

    let message = use_case.send(current.user_id, input).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(&message))))
}

/// GET /api/portal/messages
pub async fn list_messages<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
) -> PortalResult<Json<Vec<MessageResponse>>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = MessagesUseCase::new(state.repo.clone(), state.repo.clone());

    let messages = use_case.list(current.user_id).await?;

    Ok(Json(messages.iter().map(MessageResponse::from).collect()))
}

/// GET /api/portal/messages/{id}
pub async fn get_message<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> PortalResult<Json<MessageResponse>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = MessagesUseCase::new(state.repo.clone(), state.repo.clone());

    let message = use_case.get(current.user_id, id).await?;

    Ok(Json(MessageResponse::from(&message)))
}

/// POST /api/portal/messages/{id}/read
pub async fn mark_message_read<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> PortalResult<Json<MessageResponse>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = MessagesUseCase::new(state.repo.clone(), state.repo.clone());

    let message = use_case.mark_read(current.user_id, id).await?;

    Ok(Json(MessageResponse::from(&message)))
}

// ============================================================================
// Invoices (client surface)
// ============================================================================

/// GET /api/portal/invoices
pub async fn list_invoices<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
) -> PortalResult<Json<Vec<InvoiceResponse>>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = invoices_use_case(&state);

    let invoices = use_case.list(current.user_id).await?;

    Ok(Json(invoices.iter().map(InvoiceResponse::from).collect()))
}

/// GET /api/portal/invoices/{id}
pub async fn get_invoice<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> PortalResult<Json<InvoiceResponse>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = invoices_use_case(&state);

    let invoice = use_case.get(current.user_id, current.is_admin(), id).await?;

    Ok(Json(InvoiceResponse::from(&invoice)))
}

// ============================================================================
// Invoices (admin surface)
// ============================================================================

/// POST /api/portal/admin/invoices
pub async fn create_invoice<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Json(req): Json<CreateInvoiceRequest>,
) -> PortalResult<impl IntoResponse>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let due_date = req.due_date.map(parse_epoch_ms).transpose()?;

    let use_case = invoices_use_case(&state);

    let input = CreateInvoiceInput {
        client_id: req.client_id,
        amount_cents: req.amount_cents,
        currency: req.currency,
        description: req.description,
        due_date,
    };

    let invoice = use_case.create(input).await?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(&invoice))))
}

/// GET /api/portal/admin/invoices
pub async fn admin_list_invoices<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Query(query): Query<ListInvoicesQuery>,
) -> PortalResult<Json<Vec<InvoiceResponse>>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = invoices_use_case(&state);

    let invoices = use_case.list(query.client_id).await?;

    Ok(Json(invoices.iter().map(InvoiceResponse::from).collect()))
}

/// POST /api/portal/admin/invoices/{id}/send
pub async fn send_invoice<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Path(id): Path<Uuid>,
) -> PortalResult<Json<InvoiceResponse>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = invoices_use_case(&state);

    let invoice = use_case.send(id).await?;

    Ok(Json(InvoiceResponse::from(&invoice)))
}

/// POST /api/portal/admin/invoices/{id}/void
pub async fn void_invoice<P, M>(
    State(state): State<PortalAppState<P, M>>,
    Path(id): Path<Uuid>,
) -> PortalResult<Json<InvoiceResponse>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let use_case = invoices_use_case(&state);

    let invoice = use_case.void(id).await?;

    Ok(Json(InvoiceResponse::from(&invoice)))
}

// ============================================================================
// Payment Webhook
// ============================================================================

/// POST /api/portal/webhooks/payment
///
/// Unauthenticated; trust comes from the HMAC signature over the raw
/// body, checked before the body is parsed.
pub async fn payment_webhook<P, M>(
    State(state): State<PortalAppState<P, M>>,
    headers: HeaderMap,
    body: Bytes,
) -> PortalResult<Json<WebhookAckResponse>>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PortalError::InvalidSignature)?;

    if !verify_webhook_signature(&state.config.webhook_secret, &body, signature) {
        return Err(PortalError::InvalidSignature);
    }

    let event: PaymentWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| PortalError::Validation(format!("Malformed webhook body: {e}")))?;

    let use_case = invoices_use_case(&state);

    let outcome = use_case
        .record_payment(&event.event_type, &event.invoice_number, event.amount_cents)
        .await?;

    let outcome = match outcome {
        PaymentOutcome::Recorded => "recorded",
        PaymentOutcome::AlreadyPaid => "alreadyPaid",
        PaymentOutcome::Ignored => "ignored",
    };

    Ok(Json(WebhookAckResponse {
        received: true,
        outcome: outcome.to_string(),
    }))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn invoices_use_case<P, M>(state: &PortalAppState<P, M>) -> InvoicesUseCase<P, P, M>
where
    P: DocumentRepository
        + MessageRepository
        + InvoiceRepository
        + UserDirectory
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + Send + Sync + 'static,
{
    InvoicesUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.mailer.clone(),
        state.config.clone(),
    )
}

fn parse_epoch_ms(ms: i64) -> PortalResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| PortalError::Validation("Due date is out of range".to_string()))
}
