//! Unit tests for the portal crate
//!
//! Use cases and the webhook handler run against an in-memory repository
//! and recording mailers; no database or network involved.

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use platform::mail::{MailError, MailMessage, Mailer};

    use crate::application::config::PortalConfig;
    use crate::domain::entities::{Document, Invoice, Message};
    use crate::domain::repository::{
        DocumentRepository, InvoiceRepository, MessageRepository, UserDirectory,
    };
    use crate::domain::value_objects::{ClientContact, InvoiceStatus};
    use crate::error::{PortalError, PortalResult};
    use crate::presentation::handlers::PortalAppState;

    pub const WEBHOOK_SECRET: &[u8] = b"test-webhook-secret";

    /// Config with a fixed webhook secret so tests can sign payloads
    pub fn test_config() -> PortalConfig {
        PortalConfig {
            webhook_secret: WEBHOOK_SECRET.to_vec(),
            ..PortalConfig::default()
        }
    }

    /// Hex HMAC-SHA256, the format the payment provider sends
    pub fn sign(secret: &[u8], body: &[u8]) -> String {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    struct DirectoryEntry {
        active: bool,
        contact: ClientContact,
    }

    /// In-memory stand-in for the Postgres portal repository
    ///
    /// Clones share storage, so a handler state built from a clone stays
    /// observable through the original.
    #[derive(Clone, Default)]
    pub struct InMemoryPortalRepository {
        documents: Arc<Mutex<Vec<Document>>>,
        messages: Arc<Mutex<Vec<Message>>>,
        invoices: Arc<Mutex<Vec<Invoice>>>,
        users: Arc<Mutex<HashMap<i64, DirectoryEntry>>>,
    }

    impl InMemoryPortalRepository {
        pub fn add_user(&self, id: i64) {
            self.users.lock().unwrap().insert(
                id,
                DirectoryEntry {
                    active: true,
                    contact: ClientContact {
                        email: format!("user{id}@example.com"),
                        user_name: format!("user{id}"),
                    },
                },
            );
        }

        pub fn deactivate_user(&self, id: i64) {
            if let Some(entry) = self.users.lock().unwrap().get_mut(&id) {
                entry.active = false;
            }
        }

        pub fn seed_document(&self, document: Document) {
            self.documents.lock().unwrap().push(document);
        }

        pub fn seed_message(&self, message: Message) {
            self.messages.lock().unwrap().push(message);
        }

        pub fn seed_invoice(&self, invoice: Invoice) {
            self.invoices.lock().unwrap().push(invoice);
        }

        pub fn stored_document(&self, id: Uuid) -> Option<Document> {
            self.documents
                .lock()
                .unwrap()
                .iter()
                .find(|d| d.id == id)
                .cloned()
        }

        pub fn stored_message(&self, id: Uuid) -> Option<Message> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.id == id)
                .cloned()
        }

        pub fn stored_invoice(&self, id: Uuid) -> Option<Invoice> {
            self.invoices
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.id == id)
                .cloned()
        }

        pub fn document_count(&self) -> usize {
            self.documents.lock().unwrap().len()
        }
    }

    impl DocumentRepository for InMemoryPortalRepository {
        async fn create(&self, document: &Document) -> PortalResult<()> {
            self.documents.lock().unwrap().push(document.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Document>> {
            Ok(self.stored_document(id))
        }

        async fn list_by_owner(&self, owner_id: i64) -> PortalResult<Vec<Document>> {
            let mut documents: Vec<Document> = self
                .documents
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.owner_id == owner_id)
                .cloned()
                .collect();
            documents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(documents)
        }

        async fn delete(&self, id: Uuid) -> PortalResult<bool> {
            let mut documents = self.documents.lock().unwrap();
            let before = documents.len();
            documents.retain(|d| d.id != id);
            Ok(documents.len() < before)
        }
    }

    impl MessageRepository for InMemoryPortalRepository {
        async fn create(&self, message: &Message) -> PortalResult<()> {
            self.messages.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Message>> {
            Ok(self.stored_message(id))
        }

        async fn list_for_participant(&self, user_id: i64) -> PortalResult<Vec<Message>> {
            let mut messages: Vec<Message> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.sender_id == user_id || m.recipient_id == user_id)
                .cloned()
                .collect();
            messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(messages)
        }

        async fn mark_read(
            &self,
            id: Uuid,
            read_at: DateTime<Utc>,
        ) -> PortalResult<Option<DateTime<Utc>>> {
            let mut messages = self.messages.lock().unwrap();
            match messages.iter_mut().find(|m| m.id == id) {
                Some(message) => {
                    let stored = *message.read_at.get_or_insert(read_at);
                    Ok(Some(stored))
                }
                None => Ok(None),
            }
        }
    }

    impl InvoiceRepository for InMemoryPortalRepository {
        async fn create(&self, invoice: &Invoice) -> PortalResult<()> {
            let mut invoices = self.invoices.lock().unwrap();
            if invoices
                .iter()
                .any(|i| i.invoice_number == invoice.invoice_number)
            {
                return Err(PortalError::DuplicateInvoiceNumber);
            }
            invoices.push(invoice.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Invoice>> {
            Ok(self.stored_invoice(id))
        }

        async fn find_by_number(&self, invoice_number: &str) -> PortalResult<Option<Invoice>> {
            Ok(self
                .invoices
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.invoice_number == invoice_number)
                .cloned())
        }

        async fn list_by_client(&self, client_id: i64) -> PortalResult<Vec<Invoice>> {
            let mut invoices: Vec<Invoice> = self
                .invoices
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.client_id == client_id)
                .cloned()
                .collect();
            invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(invoices)
        }

        async fn transition(
            &self,
            id: Uuid,
            from: InvoiceStatus,
            to: InvoiceStatus,
            at: DateTime<Utc>,
        ) -> PortalResult<Option<Invoice>> {
            let mut invoices = self.invoices.lock().unwrap();
            // Same guard as the SQL: no row comes back unless the status
            // still matches
            match invoices.iter_mut().find(|i| i.id == id && i.status == from) {
                Some(invoice) => {
                    invoice.status = to;
                    invoice.updated_at = at;
                    match to {
                        InvoiceStatus::Sent => invoice.sent_at = Some(at),
                        InvoiceStatus::Paid => invoice.paid_at = Some(at),
                        _ => {}
                    }
                    Ok(Some(invoice.clone()))
                }
                None => Ok(None),
            }
        }
    }

    impl UserDirectory for InMemoryPortalRepository {
        async fn exists(&self, user_id: i64) -> PortalResult<bool> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .get(&user_id)
                .map(|entry| entry.active)
                .unwrap_or(false))
        }

        async fn contact(&self, user_id: i64) -> PortalResult<Option<ClientContact>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .get(&user_id)
                .filter(|entry| entry.active)
                .map(|entry| entry.contact.clone()))
        }
    }

    /// Invoice repository that reports number collisions a fixed number
    /// of times before delegating
    #[derive(Clone)]
    pub struct CollidingInvoices {
        pub inner: InMemoryPortalRepository,
        pub failures_left: Arc<Mutex<u32>>,
    }

    impl CollidingInvoices {
        pub fn new(inner: InMemoryPortalRepository, failures: u32) -> Self {
            Self {
                inner,
                failures_left: Arc::new(Mutex::new(failures)),
            }
        }
    }

    impl InvoiceRepository for CollidingInvoices {
        async fn create(&self, invoice: &Invoice) -> PortalResult<()> {
            {
                let mut left = self.failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(PortalError::DuplicateInvoiceNumber);
                }
            }
            InvoiceRepository::create(&self.inner, invoice).await
        }

        async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Invoice>> {
            InvoiceRepository::find_by_id(&self.inner, id).await
        }

        async fn find_by_number(&self, invoice_number: &str) -> PortalResult<Option<Invoice>> {
            InvoiceRepository::find_by_number(&self.inner, invoice_number).await
        }

        async fn list_by_client(&self, client_id: i64) -> PortalResult<Vec<Invoice>> {
            InvoiceRepository::list_by_client(&self.inner, client_id).await
        }

        async fn transition(
            &self,
            id: Uuid,
            from: InvoiceStatus,
            to: InvoiceStatus,
            at: DateTime<Utc>,
        ) -> PortalResult<Option<Invoice>> {
            InvoiceRepository::transition(&self.inner, id, from, to, at).await
        }
    }

    /// Mailer that stores outgoing messages for inspection
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<MailMessage>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<MailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Mailer for RecordingMailer {
        async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    /// Mailer whose provider is always down
    pub struct FailingMailer;

    impl Mailer for FailingMailer {
        async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
            Err(MailError::Transport("mail provider offline".to_string()))
        }
    }

    /// Handler state sharing storage with the given repository
    pub fn app_state(
        repo: &InMemoryPortalRepository,
    ) -> PortalAppState<InMemoryPortalRepository, RecordingMailer> {
        PortalAppState {
            repo: Arc::new(repo.clone()),
            mailer: Arc::new(RecordingMailer::default()),
            config: Arc::new(test_config()),
        }
    }

    pub fn draft_invoice(client_id: i64, number: &str, amount_cents: i64) -> Invoice {
        Invoice::new(
            client_id,
            number.to_string(),
            amount_cents,
            "USD".to_string(),
            "Estate planning services".to_string(),
            None,
        )
    }

    pub fn sent_invoice(client_id: i64, number: &str, amount_cents: i64) -> Invoice {
        let mut invoice = draft_invoice(client_id, number, amount_cents);
        invoice.status = InvoiceStatus::Sent;
        invoice.sent_at = Some(invoice.created_at);
        invoice
    }
}

#[cfg(test)]
mod document_tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::support::InMemoryPortalRepository;
    use crate::application::documents::{DocumentsUseCase, RecordDocumentInput};
    use crate::domain::entities::Document;
    use crate::error::PortalError;

    fn use_case(repo: &InMemoryPortalRepository) -> DocumentsUseCase<InMemoryPortalRepository> {
        DocumentsUseCase::new(Arc::new(repo.clone()))
    }

    fn will_input() -> RecordDocumentInput {
        RecordDocumentInput {
            filename: "will-2026.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 48_213,
            category: "wills".to_string(),
        }
    }

    #[tokio::test]
    async fn record_stores_metadata_for_caller() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let document = use_case.record(1, will_input()).await.unwrap();

        assert_eq!(document.owner_id, 1);
        assert_eq!(document.filename, "will-2026.pdf");
        assert_eq!(document.category, "wills");
        assert!(document.storage_key.starts_with("documents/1/"));

        let stored = repo.stored_document(document.id).unwrap();
        assert_eq!(stored.size_bytes, 48_213);
    }

    #[tokio::test]
    async fn record_rejects_blank_filename() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let mut input = will_input();
        input.filename = "   ".to_string();

        let result = use_case.record(1, input).await;
        assert!(matches!(result, Err(PortalError::Validation(_))));
        assert_eq!(repo.document_count(), 0);
    }

    #[tokio::test]
    async fn record_rejects_non_positive_size() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let mut input = will_input();
        input.size_bytes = 0;

        let result = use_case.record(1, input).await;
        assert!(matches!(result, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn list_returns_own_documents_newest_first() {
        let repo = InMemoryPortalRepository::default();
        let base = chrono::Utc::now();

        for (i, name) in ["first.pdf", "second.pdf", "third.pdf"].iter().enumerate() {
            let mut document = Document::new(
                1,
                name.to_string(),
                "application/pdf".to_string(),
                100,
                "wills".to_string(),
                format!("documents/1/{i}"),
            );
            document.created_at = base + Duration::minutes(i as i64);
            repo.seed_document(document);
        }
        // Someone else's document must not appear
        repo.seed_document(Document::new(
            2,
            "other.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "wills".to_string(),
            "documents/2/0".to_string(),
        ));

        let use_case = use_case(&repo);
        let documents = use_case.list(1, false, None).await.unwrap();

        let names: Vec<&str> = documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["third.pdf", "second.pdf", "first.pdf"]);
    }

    #[tokio::test]
    async fn admin_lists_another_users_documents() {
        let repo = InMemoryPortalRepository::default();
        repo.seed_document(Document::new(
            2,
            "trust.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "trusts".to_string(),
            "documents/2/0".to_string(),
        ));

        let use_case = use_case(&repo);

        let documents = use_case.list(9, true, Some(2)).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].owner_id, 2);
    }

    #[tokio::test]
    async fn non_admin_cannot_list_another_users_documents() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let result = use_case.list(1, false, Some(2)).await;
        assert!(matches!(result, Err(PortalError::Forbidden)));
    }

    #[tokio::test]
    async fn get_hides_other_users_documents() {
        let repo = InMemoryPortalRepository::default();
        let document = Document::new(
            1,
            "will.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "wills".to_string(),
            "documents/1/0".to_string(),
        );
        let id = document.id;
        repo.seed_document(document);

        let use_case = use_case(&repo);

        // Owner and admin can read it
        assert!(use_case.get(1, false, id).await.is_ok());
        assert!(use_case.get(9, true, id).await.is_ok());

        // Anyone else sees the same error as for a missing id
        let result = use_case.get(2, false, id).await;
        assert!(matches!(result, Err(PortalError::DocumentNotFound)));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let repo = InMemoryPortalRepository::default();
        let document = Document::new(
            1,
            "old-will.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "wills".to_string(),
            "documents/1/0".to_string(),
        );
        let id = document.id;
        repo.seed_document(document);

        let use_case = use_case(&repo);
        use_case.delete(1, false, id).await.unwrap();

        assert!(repo.stored_document(id).is_none());

        let result = use_case.get(1, false, id).await;
        assert!(matches!(result, Err(PortalError::DocumentNotFound)));
    }

    #[tokio::test]
    async fn delete_by_non_owner_leaves_record() {
        let repo = InMemoryPortalRepository::default();
        let document = Document::new(
            1,
            "will.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "wills".to_string(),
            "documents/1/0".to_string(),
        );
        let id = document.id;
        repo.seed_document(document);

        let use_case = use_case(&repo);

        let result = use_case.delete(2, false, id).await;
        assert!(matches!(result, Err(PortalError::DocumentNotFound)));
        assert!(repo.stored_document(id).is_some());
    }
}

#[cfg(test)]
mod message_tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::support::InMemoryPortalRepository;
    use crate::application::messages::{MessagesUseCase, SendMessageInput};
    use crate::domain::entities::Message;
    use crate::domain::repository::MessageRepository;
    use crate::error::PortalError;

    fn use_case(
        repo: &InMemoryPortalRepository,
    ) -> MessagesUseCase<InMemoryPortalRepository, InMemoryPortalRepository> {
        MessagesUseCase::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    fn hello_input(recipient_id: i64) -> SendMessageInput {
        SendMessageInput {
            recipient_id,
            subject: "Question about my trust".to_string(),
            body: "Could we schedule a call this week?".to_string(),
        }
    }

    #[tokio::test]
    async fn send_delivers_unread_message() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(2);

        let use_case = use_case(&repo);
        let message = use_case.send(1, hello_input(2)).await.unwrap();

        assert_eq!(message.sender_id, 1);
        assert_eq!(message.recipient_id, 2);
        assert!(message.read_at.is_none());

        let stored = repo.stored_message(message.id).unwrap();
        assert_eq!(stored.subject, "Question about my trust");
    }

    #[tokio::test]
    async fn send_to_unknown_recipient_fails() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let result = use_case.send(1, hello_input(42)).await;
        assert!(matches!(result, Err(PortalError::UserNotFound)));
    }

    #[tokio::test]
    async fn send_to_deactivated_recipient_fails() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(2);
        repo.deactivate_user(2);

        let use_case = use_case(&repo);

        let result = use_case.send(1, hello_input(2)).await;
        assert!(matches!(result, Err(PortalError::UserNotFound)));
    }

    #[tokio::test]
    async fn send_to_self_rejected() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);

        let use_case = use_case(&repo);

        let result = use_case.send(1, hello_input(1)).await;
        assert!(matches!(result, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn send_rejects_blank_subject() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(2);

        let use_case = use_case(&repo);

        let mut input = hello_input(2);
        input.subject = "  ".to_string();

        let result = use_case.send(1, input).await;
        assert!(matches!(result, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn list_includes_both_directions_newest_first() {
        let repo = InMemoryPortalRepository::default();
        let base = chrono::Utc::now();

        let mut outgoing = Message::new(1, 2, "Sent by me".to_string(), "body".to_string());
        outgoing.created_at = base;
        repo.seed_message(outgoing);

        let mut incoming = Message::new(2, 1, "Sent to me".to_string(), "body".to_string());
        incoming.created_at = base + Duration::minutes(1);
        repo.seed_message(incoming);

        // A thread between two other users stays invisible
        repo.seed_message(Message::new(2, 3, "Private".to_string(), "body".to_string()));

        let use_case = use_case(&repo);
        let messages = use_case.list(1).await.unwrap();

        let subjects: Vec<&str> = messages.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Sent to me", "Sent by me"]);
    }

    #[tokio::test]
    async fn get_hidden_from_non_participants() {
        let repo = InMemoryPortalRepository::default();
        let message = Message::new(1, 2, "Between 1 and 2".to_string(), "body".to_string());
        let id = message.id;
        repo.seed_message(message);

        let use_case = use_case(&repo);

        assert!(use_case.get(1, id).await.is_ok());
        assert!(use_case.get(2, id).await.is_ok());

        // An admin is user 9 here; messages stay participant-only
        let result = use_case.get(9, id).await;
        assert!(matches!(result, Err(PortalError::MessageNotFound)));
    }

    #[tokio::test]
    async fn recipient_marks_read_idempotently() {
        let repo = InMemoryPortalRepository::default();
        let message = Message::new(1, 2, "Unread".to_string(), "body".to_string());
        let id = message.id;
        repo.seed_message(message);

        let use_case = use_case(&repo);

        let first = use_case.mark_read(2, id).await.unwrap();
        let read_at = first.read_at.unwrap();

        // Second call answers with the original timestamp
        let second = use_case.mark_read(2, id).await.unwrap();
        assert_eq!(second.read_at, Some(read_at));

        let stored = repo.stored_message(id).unwrap();
        assert_eq!(stored.read_at, Some(read_at));
    }

    #[tokio::test]
    async fn mark_read_reports_timestamp_a_racing_reader_stored() {
        let repo = InMemoryPortalRepository::default();
        let message = Message::new(1, 2, "Unread".to_string(), "body".to_string());
        let id = message.id;
        repo.seed_message(message);

        // A concurrent marker wins; the store keeps this earlier timestamp
        let earlier = Utc::now() - Duration::minutes(5);
        MessageRepository::mark_read(&repo, id, earlier)
            .await
            .unwrap();

        // A later write hands back the timestamp the first one stored
        let stored = MessageRepository::mark_read(&repo, id, Utc::now())
            .await
            .unwrap();
        assert_eq!(stored, Some(earlier));

        let use_case = use_case(&repo);
        let marked = use_case.mark_read(2, id).await.unwrap();

        // The response carries what the store kept, not a fresh clock read
        assert_eq!(marked.read_at, Some(earlier));
        assert_eq!(repo.stored_message(id).unwrap().read_at, Some(earlier));
    }

    #[tokio::test]
    async fn sender_cannot_mark_read() {
        let repo = InMemoryPortalRepository::default();
        let message = Message::new(1, 2, "Unread".to_string(), "body".to_string());
        let id = message.id;
        repo.seed_message(message);

        let use_case = use_case(&repo);

        let result = use_case.mark_read(1, id).await;
        assert!(matches!(result, Err(PortalError::Forbidden)));

        assert!(repo.stored_message(id).unwrap().read_at.is_none());
    }

    #[tokio::test]
    async fn mark_read_unknown_message_fails() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let result = use_case.mark_read(1, uuid::Uuid::new_v4()).await;
        assert!(matches!(result, Err(PortalError::MessageNotFound)));
    }
}

#[cfg(test)]
mod invoice_tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use super::support::{
        CollidingInvoices, FailingMailer, InMemoryPortalRepository, RecordingMailer, draft_invoice,
        sent_invoice, test_config,
    };
    use crate::application::invoices::{CreateInvoiceInput, InvoicesUseCase};
    use crate::domain::value_objects::InvoiceStatus;
    use crate::error::PortalError;

    fn use_case(
        repo: &InMemoryPortalRepository,
    ) -> InvoicesUseCase<InMemoryPortalRepository, InMemoryPortalRepository, RecordingMailer> {
        InvoicesUseCase::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(RecordingMailer::default()),
            Arc::new(test_config()),
        )
    }

    fn create_input(client_id: i64, amount_cents: i64) -> CreateInvoiceInput {
        CreateInvoiceInput {
            client_id,
            amount_cents,
            currency: None,
            description: "Will preparation".to_string(),
            due_date: None,
        }
    }

    #[tokio::test]
    async fn create_drafts_invoice_with_generated_number() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);

        let use_case = use_case(&repo);
        let invoice = use_case.create(create_input(1, 45_000)).await.unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.currency, "USD");
        assert!(invoice.sent_at.is_none());

        let number = &invoice.invoice_number;
        assert!(number.starts_with("INV-"));
        let serial = number.rsplit('-').next().unwrap();
        assert_eq!(serial.len(), 6);
        assert!(serial.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn create_for_unknown_client_fails() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let result = use_case.create(create_input(42, 45_000)).await;
        assert!(matches!(result, Err(PortalError::UserNotFound)));
    }

    #[tokio::test]
    async fn create_rejects_non_positive_amount() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);

        let use_case = use_case(&repo);

        for amount in [0, -500] {
            let result = use_case.create(create_input(1, amount)).await;
            assert!(matches!(result, Err(PortalError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn create_rejects_malformed_currency() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);

        let use_case = use_case(&repo);

        let mut input = create_input(1, 45_000);
        input.currency = Some("dollars".to_string());

        let result = use_case.create(input).await;
        assert!(matches!(result, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn create_retries_after_number_collision() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);

        // First two draws collide, the third lands
        let invoices = CollidingInvoices::new(repo.clone(), 2);
        let use_case = InvoicesUseCase::new(
            Arc::new(invoices),
            Arc::new(repo.clone()),
            Arc::new(RecordingMailer::default()),
            Arc::new(test_config()),
        );

        let invoice = use_case.create(create_input(1, 45_000)).await.unwrap();
        assert!(repo.stored_invoice(invoice.id).is_some());
    }

    #[tokio::test]
    async fn create_gives_up_after_repeated_collisions() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);

        let invoices = CollidingInvoices::new(repo.clone(), 99);
        let use_case = InvoicesUseCase::new(
            Arc::new(invoices),
            Arc::new(repo.clone()),
            Arc::new(RecordingMailer::default()),
            Arc::new(test_config()),
        );

        let result = use_case.create(create_input(1, 45_000)).await;
        assert!(matches!(result, Err(PortalError::Internal(_))));
    }

    #[tokio::test]
    async fn send_transitions_and_notifies_client() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);
        let invoice = draft_invoice(1, "INV-2026-000123", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let mailer = Arc::new(RecordingMailer::default());
        let use_case = InvoicesUseCase::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            mailer.clone(),
            Arc::new(test_config()),
        );

        let sent = use_case.send(id).await.unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);
        assert!(sent.sent_at.is_some());

        let mails = mailer.sent();
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].to, "user1@example.com");
        assert!(mails[0].subject.contains("INV-2026-000123"));
        assert!(mails[0].text_body.contains("450.00 USD"));
    }

    #[tokio::test]
    async fn send_non_draft_conflicts() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);
        let invoice = sent_invoice(1, "INV-2026-000124", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let use_case = use_case(&repo);

        match use_case.send(id).await {
            Err(e @ PortalError::IllegalTransition { .. }) => {
                assert_eq!(e.status_code(), StatusCode::CONFLICT);
            }
            other => panic!("expected conflict, got {:?}", other.map(|i| i.status)),
        }
    }

    #[tokio::test]
    async fn send_mail_failure_keeps_invoice_sent() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);
        let invoice = draft_invoice(1, "INV-2026-000125", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let use_case = InvoicesUseCase::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(FailingMailer),
            Arc::new(test_config()),
        );

        let err = use_case.send(id).await.unwrap_err();
        assert!(matches!(err, PortalError::MailDispatch(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        // The billing state change is not rolled back for a notification
        // failure
        let stored = repo.stored_invoice(id).unwrap();
        assert_eq!(stored.status, InvoiceStatus::Sent);
        assert!(stored.sent_at.is_some());
    }

    #[tokio::test]
    async fn void_covers_draft_and_sent_only() {
        let repo = InMemoryPortalRepository::default();
        repo.add_user(1);

        let draft = draft_invoice(1, "INV-2026-000126", 45_000);
        let draft_id = draft.id;
        repo.seed_invoice(draft);

        let sent = sent_invoice(1, "INV-2026-000127", 45_000);
        let sent_id = sent.id;
        repo.seed_invoice(sent);

        let mut paid = sent_invoice(1, "INV-2026-000128", 45_000);
        paid.status = InvoiceStatus::Paid;
        let paid_id = paid.id;
        repo.seed_invoice(paid);

        let use_case = use_case(&repo);

        assert_eq!(
            use_case.void(draft_id).await.unwrap().status,
            InvoiceStatus::Void
        );
        assert_eq!(
            use_case.void(sent_id).await.unwrap().status,
            InvoiceStatus::Void
        );

        let result = use_case.void(paid_id).await;
        assert!(matches!(
            result,
            Err(PortalError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn get_scopes_to_owner_or_admin() {
        let repo = InMemoryPortalRepository::default();
        let invoice = draft_invoice(1, "INV-2026-000129", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let use_case = use_case(&repo);

        assert!(use_case.get(1, false, id).await.is_ok());
        assert!(use_case.get(9, true, id).await.is_ok());

        let result = use_case.get(2, false, id).await;
        assert!(matches!(result, Err(PortalError::InvoiceNotFound)));
    }

    #[tokio::test]
    async fn list_returns_own_invoices_only() {
        let repo = InMemoryPortalRepository::default();
        repo.seed_invoice(draft_invoice(1, "INV-2026-000130", 45_000));
        repo.seed_invoice(draft_invoice(2, "INV-2026-000131", 12_000));

        let use_case = use_case(&repo);
        let invoices = use_case.list(1).await.unwrap();

        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].client_id, 1);
    }

    #[tokio::test]
    async fn send_unknown_invoice_fails() {
        let repo = InMemoryPortalRepository::default();
        let use_case = use_case(&repo);

        let result = use_case.send(uuid::Uuid::new_v4()).await;
        assert!(matches!(result, Err(PortalError::InvoiceNotFound)));
    }

    #[tokio::test]
    async fn transition_requires_matching_status() {
        use crate::domain::repository::InvoiceRepository;

        let repo = InMemoryPortalRepository::default();
        let invoice = sent_invoice(1, "INV-2026-000132", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        // A writer that still believes the invoice is a draft gets no row
        let result = InvoiceRepository::transition(
            &repo,
            id,
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            chrono::Utc::now(),
        )
        .await
        .unwrap();

        assert!(result.is_none());
        assert_eq!(repo.stored_invoice(id).unwrap().status, InvoiceStatus::Sent);
    }
}

#[cfg(test)]
mod webhook_tests {
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, HeaderValue};

    use super::support::{
        InMemoryPortalRepository, WEBHOOK_SECRET, app_state, draft_invoice, sent_invoice, sign,
    };
    use crate::domain::value_objects::InvoiceStatus;
    use crate::error::PortalError;
    use crate::presentation::handlers::{WEBHOOK_SIGNATURE_HEADER, payment_webhook};

    #[test]
    fn app_state_clones_share_backing_stores() {
        let repo = InMemoryPortalRepository::default();
        let state = app_state(&repo);
        let cloned = state.clone();

        assert!(std::sync::Arc::ptr_eq(&state.repo, &cloned.repo));
        assert!(std::sync::Arc::ptr_eq(&state.mailer, &cloned.mailer));
        assert!(std::sync::Arc::ptr_eq(&state.config, &cloned.config));
    }

    fn event_body(event_type: &str, invoice_number: &str, amount_cents: i64) -> String {
        serde_json::json!({
            "eventType": event_type,
            "invoiceNumber": invoice_number,
            "amountCents": amount_cents,
        })
        .to_string()
    }

    fn signed_headers(body: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let signature = sign(WEBHOOK_SECRET, body.as_bytes());
        headers.insert(
            WEBHOOK_SIGNATURE_HEADER,
            HeaderValue::from_str(&signature).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn valid_signature_records_payment() {
        let repo = InMemoryPortalRepository::default();
        let invoice = sent_invoice(1, "INV-2026-000200", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let body = event_body("payment.succeeded", "INV-2026-000200", 45_000);
        let headers = signed_headers(&body);

        let axum::Json(ack) = payment_webhook(State(app_state(&repo)), headers, Bytes::from(body))
            .await
            .unwrap();

        assert!(ack.received);
        assert_eq!(ack.outcome, "recorded");

        let paid = repo.stored_invoice(id).unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.paid_at.is_some());
    }

    #[tokio::test]
    async fn missing_signature_rejected() {
        let repo = InMemoryPortalRepository::default();
        let invoice = sent_invoice(1, "INV-2026-000201", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let body = event_body("payment.succeeded", "INV-2026-000201", 45_000);

        let result = payment_webhook(
            State(app_state(&repo)),
            HeaderMap::new(),
            Bytes::from(body),
        )
        .await;

        assert!(matches!(result, Err(PortalError::InvalidSignature)));
        assert_eq!(repo.stored_invoice(id).unwrap().status, InvoiceStatus::Sent);
    }

    #[tokio::test]
    async fn tampered_body_rejected() {
        let repo = InMemoryPortalRepository::default();
        let invoice = sent_invoice(1, "INV-2026-000202", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let body = event_body("payment.succeeded", "INV-2026-000202", 45_000);
        let headers = signed_headers(&body);

        // Signature was computed over the original body
        let tampered = event_body("payment.succeeded", "INV-2026-000202", 1);

        let result = payment_webhook(State(app_state(&repo)), headers, Bytes::from(tampered)).await;

        assert!(matches!(result, Err(PortalError::InvalidSignature)));
        assert_eq!(repo.stored_invoice(id).unwrap().status, InvoiceStatus::Sent);
    }

    #[tokio::test]
    async fn second_delivery_acknowledged_without_effect() {
        let repo = InMemoryPortalRepository::default();
        let invoice = sent_invoice(1, "INV-2026-000203", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let body = event_body("payment.succeeded", "INV-2026-000203", 45_000);

        let axum::Json(first) = payment_webhook(
            State(app_state(&repo)),
            signed_headers(&body),
            Bytes::from(body.clone()),
        )
        .await
        .unwrap();
        assert_eq!(first.outcome, "recorded");

        let paid_at = repo.stored_invoice(id).unwrap().paid_at;

        let axum::Json(second) = payment_webhook(
            State(app_state(&repo)),
            signed_headers(&body),
            Bytes::from(body),
        )
        .await
        .unwrap();
        assert_eq!(second.outcome, "alreadyPaid");

        assert_eq!(repo.stored_invoice(id).unwrap().paid_at, paid_at);
    }

    #[tokio::test]
    async fn amount_mismatch_rejected() {
        let repo = InMemoryPortalRepository::default();
        let invoice = sent_invoice(1, "INV-2026-000204", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let body = event_body("payment.succeeded", "INV-2026-000204", 44_999);
        let headers = signed_headers(&body);

        let result = payment_webhook(State(app_state(&repo)), headers, Bytes::from(body)).await;

        assert!(matches!(result, Err(PortalError::AmountMismatch)));
        assert_eq!(repo.stored_invoice(id).unwrap().status, InvoiceStatus::Sent);
    }

    #[tokio::test]
    async fn payment_for_draft_invoice_conflicts() {
        let repo = InMemoryPortalRepository::default();
        let invoice = draft_invoice(1, "INV-2026-000205", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let body = event_body("payment.succeeded", "INV-2026-000205", 45_000);
        let headers = signed_headers(&body);

        let result = payment_webhook(State(app_state(&repo)), headers, Bytes::from(body)).await;

        assert!(matches!(
            result,
            Err(PortalError::IllegalTransition { .. })
        ));
        assert_eq!(
            repo.stored_invoice(id).unwrap().status,
            InvoiceStatus::Draft
        );
    }

    #[tokio::test]
    async fn payment_for_unknown_invoice_fails() {
        let repo = InMemoryPortalRepository::default();

        let body = event_body("payment.succeeded", "INV-2026-999999", 45_000);
        let headers = signed_headers(&body);

        let result = payment_webhook(State(app_state(&repo)), headers, Bytes::from(body)).await;

        assert!(matches!(result, Err(PortalError::InvoiceNotFound)));
    }

    #[tokio::test]
    async fn other_event_types_acknowledged_and_ignored() {
        let repo = InMemoryPortalRepository::default();
        let invoice = sent_invoice(1, "INV-2026-000206", 45_000);
        let id = invoice.id;
        repo.seed_invoice(invoice);

        let body = event_body("payment.failed", "INV-2026-000206", 45_000);
        let headers = signed_headers(&body);

        let axum::Json(ack) = payment_webhook(State(app_state(&repo)), headers, Bytes::from(body))
            .await
            .unwrap();

        assert_eq!(ack.outcome, "ignored");
        assert_eq!(repo.stored_invoice(id).unwrap().status, InvoiceStatus::Sent);
    }

    #[tokio::test]
    async fn malformed_body_with_valid_signature_rejected() {
        let repo = InMemoryPortalRepository::default();

        let body = "not json".to_string();
        let headers = signed_headers(&body);

        let result = payment_webhook(State(app_state(&repo)), headers, Bytes::from(body)).await;

        assert!(matches!(result, Err(PortalError::Validation(_))));
    }
}

#[cfg(test)]
mod dto_tests {
    use super::support::{draft_invoice, sent_invoice};
    use crate::domain::entities::{Document, Message};
    use crate::presentation::dto::{DocumentResponse, InvoiceResponse, MessageResponse};

    #[test]
    fn document_response_omits_storage_key() {
        let document = Document::new(
            1,
            "will.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "wills".to_string(),
            "documents/1/secret".to_string(),
        );

        let value = serde_json::to_value(DocumentResponse::from(&document)).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("ownerId"));
        assert!(object.contains_key("contentType"));
        assert!(object.contains_key("sizeBytes"));
        assert!(object.contains_key("createdAt"));
        assert!(!object.contains_key("storageKey"));
        assert!(!object.contains_key("storage_key"));
    }

    #[test]
    fn message_response_uses_camel_case_keys() {
        let message = Message::new(1, 2, "Subject".to_string(), "Body".to_string());

        let value = serde_json::to_value(MessageResponse::from(&message)).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("senderId"));
        assert!(object.contains_key("recipientId"));
        assert!(object["readAt"].is_null());
        assert!(object["createdAt"].is_i64());
    }

    #[test]
    fn invoice_response_renders_status_as_code() {
        let value = serde_json::to_value(InvoiceResponse::from(&draft_invoice(
            1,
            "INV-2026-000300",
            45_000,
        )))
        .unwrap();

        assert_eq!(value["status"], "draft");
        assert_eq!(value["invoiceNumber"], "INV-2026-000300");
        assert_eq!(value["amountCents"], 45_000);
        assert!(value["sentAt"].is_null());
        assert!(value["dueDate"].is_null());

        let sent = serde_json::to_value(InvoiceResponse::from(&sent_invoice(
            1,
            "INV-2026-000301",
            45_000,
        )))
        .unwrap();

        assert_eq!(sent["status"], "sent");
        assert!(sent["sentAt"].is_i64());
    }
}
