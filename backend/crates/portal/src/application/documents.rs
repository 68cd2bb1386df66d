//! Document Use Cases
//!
//! Records, lists and removes upload metadata. The file bodies live
//! behind opaque storage keys; only the metadata passes through here.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::entities::Document;
use crate::domain::repository::DocumentRepository;
use crate::error::{PortalError, PortalResult};

const MAX_FILENAME_LEN: usize = 255;
const MAX_CATEGORY_LEN: usize = 64;

/// Input for recording an uploaded document
#[derive(Debug, Clone)]
pub struct RecordDocumentInput {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub category: String,
}

/// Document use cases
pub struct DocumentsUseCase<D>
where
    D: DocumentRepository,
{
    documents: Arc<D>,
}

impl<D> DocumentsUseCase<D>
where
    D: DocumentRepository,
{
    pub fn new(documents: Arc<D>) -> Self {
        Self { documents }
    }

    /// Record upload metadata for the calling user
    pub async fn record(
        &self,
        owner_id: i64,
        input: RecordDocumentInput,
    ) -> PortalResult<Document> {
        let filename = input.filename.trim();
        if filename.is_empty() {
            return Err(PortalError::Validation("Filename is required".to_string()));
        }
        if filename.len() > MAX_FILENAME_LEN {
            return Err(PortalError::Validation(format!(
                "Filename must be at most {} characters",
                MAX_FILENAME_LEN
            )));
        }

        let content_type = input.content_type.trim();
        if content_type.is_empty() {
            return Err(PortalError::Validation(
                "Content type is required".to_string(),
            ));
        }

        if input.size_bytes <= 0 {
            return Err(PortalError::Validation(
                "Document size must be positive".to_string(),
            ));
        }

        let category = input.category.trim();
        if category.is_empty() {
            return Err(PortalError::Validation("Category is required".to_string()));
        }
        if category.len() > MAX_CATEGORY_LEN {
            return Err(PortalError::Validation(format!(
                "Category must be at most {} characters",
                MAX_CATEGORY_LEN
            )));
        }

        // The key is assigned here, never taken from the client
        let storage_key = format!("documents/{}/{}", owner_id, Uuid::new_v4());

        let document = Document::new(
            owner_id,
            filename.to_string(),
            content_type.to_string(),
            input.size_bytes,
            category.to_string(),
            storage_key,
        );

        self.documents.create(&document).await?;

        tracing::info!(
            document_id = %document.id,
            owner_id = document.owner_id,
            "Document recorded"
        );

        Ok(document)
    }

    /// List documents for the caller, or for another user when an admin asks
    pub async fn list(
        &self,
        caller_id: i64,
        caller_is_admin: bool,
        for_user: Option<i64>,
    ) -> PortalResult<Vec<Document>> {
        let target = match for_user {
            Some(user_id) if user_id != caller_id => {
                if !caller_is_admin {
                    return Err(PortalError::Forbidden);
                }
                user_id
            }
            _ => caller_id,
        };

        self.documents.list_by_owner(target).await
    }

    /// Get a single document, owner-or-admin
    pub async fn get(
        &self,
        caller_id: i64,
        caller_is_admin: bool,
        id: Uuid,
    ) -> PortalResult<Document> {
        let document = self
            .documents
            .find_by_id(id)
            .await?
            .ok_or(PortalError::DocumentNotFound)?;

        // Non-owners get the same 404 as a missing row
        if document.owner_id != caller_id && !caller_is_admin {
            return Err(PortalError::DocumentNotFound);
        }

        Ok(document)
    }

    /// Delete a document record, owner-or-admin
    pub async fn delete(&self, caller_id: i64, caller_is_admin: bool, id: Uuid) -> PortalResult<()> {
        let document = self.get(caller_id, caller_is_admin, id).await?;

        if !self.documents.delete(document.id).await? {
            return Err(PortalError::DocumentNotFound);
        }

        tracing::info!(
            document_id = %document.id,
            owner_id = document.owner_id,
            "Document deleted"
        );

        Ok(())
    }
}
