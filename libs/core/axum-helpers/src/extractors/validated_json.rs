//! JSON extractor with automatic validation using the validator crate.

use crate::errors::AppError;
use axum::{
    extract::{FromRequest, Json, Request},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Rejects with 400 and per-field `details` when `Validate` fails.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct PrepareSlotsRequest {
///     #[validate(length(min = 1, max = 20))]
///     slots: Vec<SlotInput>,
/// }
///
/// async fn prepare(ValidatedJson(body): ValidatedJson<PrepareSlotsRequest>) { }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::JsonExtractorRejection(e).into_response())?;

        data.validate()
            .map_err(|e| AppError::ValidationError(e).into_response())?;

        Ok(ValidatedJson(data))
    }
}
