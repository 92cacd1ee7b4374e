use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::dtos::{ActionResult, ForgotPasswordForm, ResetPageQuery, ResetPageView, ResetPasswordForm};
use crate::error::{AuthFailure, MISSING_TOKEN_MESSAGE};
use crate::services::password_reset::{self, ResetFailure, ResetPage, RESET_SUCCESS_REDIRECT};
use crate::utils::{ParsedForm, ValidatedForm};
use crate::AppState;

/// Step 1: mail a reset link. The response is the same whether or not the
/// address is registered.
pub async fn forget_password_handler(
    State(state): State<AppState>,
    ValidatedForm(payload): ValidatedForm<ForgotPasswordForm>,
) -> Result<impl IntoResponse, AuthFailure> {
    let redirect_to = state.settings.reset_redirect_url();
    password_reset::request_reset(state.provider.as_ref(), &payload.email, &redirect_to).await?;
    Ok(Json(ActionResult::ok()))
}

/// Page load of the reset link: tells the client whether it holds a code.
pub async fn reset_password_page(Query(query): Query<ResetPageQuery>) -> impl IntoResponse {
    let view = match ResetPage::from_query(query.code.as_deref()) {
        ResetPage::CodePresent(_) => ResetPageView {
            state: "code_present",
            error: None,
        },
        ResetPage::CodeMissing => ResetPageView {
            state: "code_missing",
            error: Some(MISSING_TOKEN_MESSAGE.to_string()),
        },
    };
    Json(view)
}

/// Step 2: exchange the code and store the new password. A refused password
/// leaves the recovery session in a cookie scoped to the reset page, so the
/// spent code is not needed for the next try.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ParsedForm(payload): ParsedForm<ResetPasswordForm>,
) -> Response {
    let recovery_token = jar
        .get(state.cookies.recovery_name())
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty());

    match password_reset::perform_reset(state.provider.as_ref(), &payload, recovery_token.as_deref())
        .await
    {
        Ok(()) => {
            let jar = match recovery_token {
                Some(_) => jar.add(state.cookies.clear_recovery()),
                None => jar,
            };
            (jar, Json(ActionResult::redirect(RESET_SUCCESS_REDIRECT))).into_response()
        }
        Err(ResetFailure { failure, recovery }) => {
            let jar = match recovery {
                Some(session) => jar.add(state.cookies.issue_recovery(&session.tokens)),
                None => jar,
            };
            (jar, failure).into_response()
        }
    }
}
