//! Request body extraction with validation at the edge.
//!
//! Handlers take `ValidatedJson<T>` instead of `Json<T>`; malformed JSON and
//! failed `validator` rules both come back as a 400 with field errors before
//! the handler runs. `Path` and `Query` wrap axum's extractors so bad ids and
//! query strings get the same JSON error body.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use super::error::CrmError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CrmError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(CrmError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(CrmError))]
pub struct Query<T>(pub T);

/// Rejects values that are empty once trimmed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Trims and drops empty strings so optional text fields store as NULL.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  Acme ".into())), Some("Acme".into()));
        assert_eq!(clean_optional(Some("   ".into())), None);
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("Budi").is_ok());
        assert!(not_blank(" Budi ").is_ok());
        let err = not_blank(" \t ").unwrap_err();
        assert_eq!(err.code, "blank");
        assert!(not_blank("").is_err());
    }
}
