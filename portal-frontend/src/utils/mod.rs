use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::dtos::ActionResult;
use crate::error::AuthFailure;

/// URL-encoded form whose parse failures are reported as an
/// [`ActionResult`] with status 400. Validation is left to the handler.
pub struct ParsedForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ParsedForm<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ActionResult::failure(format!("Form parse error: {}", e))),
            )
                .into_response()
        })?;

        Ok(ParsedForm(value))
    }
}

/// URL-encoded form that has passed its `validator` rules. Failing input
/// never reaches the handler, so no provider call is made for it.
pub struct ValidatedForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedForm<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ParsedForm(value) = ParsedForm::<T>::from_request(req, state).await?;

        value
            .validate()
            .map_err(|errors| AuthFailure::from_validation(&errors).into_response())?;

        Ok(ValidatedForm(value))
    }
}
