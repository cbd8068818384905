//! Input validation applied before a save touches any store.

use crate::config::VersioningConfig;
use crate::error::CoreError;
use crate::types::DbId;

/// Document ids come from the page layer and are always positive.
pub fn validate_document_id(document_id: DbId) -> Result<(), CoreError> {
    if document_id <= 0 {
        return Err(CoreError::Validation(format!(
            "Document id must be positive, got {document_id}"
        )));
    }
    Ok(())
}

/// Validate document content against the configured size limit.
pub fn validate_content(content: &str, config: &VersioningConfig) -> Result<(), CoreError> {
    if content.chars().count() > config.max_content_chars {
        return Err(CoreError::Validation(format!(
            "Content must be at most {} characters",
            config.max_content_chars
        )));
    }
    Ok(())
}

/// Validate an optional change description (non-blank when present).
pub fn validate_change_description(
    description: Option<&str>,
    config: &VersioningConfig,
) -> Result<(), CoreError> {
    let Some(description) = description else {
        return Ok(());
    };
    if description.trim().is_empty() {
        return Err(CoreError::Validation(
            "Change description must not be blank".into(),
        ));
    }
    if description.chars().count() > config.max_description_chars {
        return Err(CoreError::Validation(format!(
            "Change description must be at most {} characters",
            config.max_description_chars
        )));
    }
    Ok(())
}
