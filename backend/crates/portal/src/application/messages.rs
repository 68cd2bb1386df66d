//! Message Use Cases
//!
//! Secure messaging between portal users. A message is visible only to
//! its two participants; even admins cannot read other people's threads.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::entities::Message;
use crate::domain::repository::{MessageRepository, UserDirectory};
use crate::error::{PortalError, PortalResult};

const MAX_SUBJECT_LEN: usize = 200;
const MAX_BODY_LEN: usize = 10_000;

/// Input for sending a message
#[derive(Debug, Clone)]
pub struct SendMessageInput {
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
}

/// Message use cases
pub struct MessagesUseCase<M, U>
where
    M: MessageRepository,
    U: UserDirectory,
{
    messages: Arc<M>,
    users: Arc<U>,
}

impl<M, U> MessagesUseCase<M, U>
where
    M: MessageRepository,
    U: UserDirectory,
{
    pub fn new(messages: Arc<M>, users: Arc<U>) -> Self {
        Self { messages, users }
    }

    /// Send a message to another portal user
    pub async fn send(&self, sender_id: i64, input: SendMessageInput) -> PortalResult<Message> {
        let subject = input.subject.trim();
        if subject.is_empty() {
            return Err(PortalError::Validation("Subject is required".to_string()));
        }
        if subject.len() > MAX_SUBJECT_LEN {
            return Err(PortalError::Validation(format!(
                "Subject must be at most {} characters",
                MAX_SUBJECT_LEN
            )));
        }

        if input.body.trim().is_empty() {
            return Err(PortalError::Validation(
                "Message body is required".to_string(),
            ));
        }
        if input.body.len() > MAX_BODY_LEN {
            return Err(PortalError::Validation(format!(
                "Message body must be at most {} characters",
                MAX_BODY_LEN
            )));
        }

        if input.recipient_id == sender_id {
            return Err(PortalError::Validation(
                "You cannot send a message to yourself".to_string(),
            ));
        }

        if !self.users.exists(input.recipient_id).await? {
            return Err(PortalError::UserNotFound);
        }

        let message = Message::new(
            sender_id,
            input.recipient_id,
            subject.to_string(),
            input.body,
        );

        self.messages.create(&message).await?;

        tracing::info!(
            message_id = %message.id,
            sender_id = message.sender_id,
            recipient_id = message.recipient_id,
            "Message sent"
        );

        Ok(message)
    }

    /// List messages the caller sent or received, newest first
    pub async fn list(&self, caller_id: i64) -> PortalResult<Vec<Message>> {
        self.messages.list_for_participant(caller_id).await
    }

    /// Get a single message, participant-only
    pub async fn get(&self, caller_id: i64, id: Uuid) -> PortalResult<Message> {
        let message = self
            .messages
            .find_by_id(id)
            .await?
            .ok_or(PortalError::MessageNotFound)?;

        // Non-participants get the same 404 as a missing row
        if !message.involves(caller_id) {
            return Err(PortalError::MessageNotFound);
        }

        Ok(message)
    }

    /// Mark a message read; recipient-only, idempotent
    pub async fn mark_read(&self, caller_id: i64, id: Uuid) -> PortalResult<Message> {
        let mut message = self.get(caller_id, id).await?;

        if message.recipient_id != caller_id {
            return Err(PortalError::Forbidden);
        }

        // Already read: keep the original timestamp
        if message.read_at.is_some() {
            return Ok(message);
        }

        // The store only fills a null read_at; a concurrent marker may
        // have won, so report the timestamp it actually kept
        let stored = self
            .messages
            .mark_read(message.id, Utc::now())
            .await?
            .ok_or(PortalError::MessageNotFound)?;

        message.read_at = Some(stored);
        Ok(message)
    }
}
