use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;

use crate::dtos::{ActionResult, AuthPageView, LoginForm, SignupForm};
use crate::error::AuthFailure;
use crate::models::route::{HOME_PATH, LOGIN_PATH};
use crate::models::user::CurrentUser;
use crate::utils::ValidatedForm;
use crate::AppState;

fn with_cookies(
    mut jar: CookieJar,
    cookies: Vec<axum_extra::extract::cookie::Cookie<'static>>,
) -> CookieJar {
    for cookie in cookies {
        jar = jar.add(cookie);
    }
    jar
}

fn page(name: &'static str, user: Option<CurrentUser>) -> Json<AuthPageView> {
    Json(AuthPageView {
        page: name,
        signed_in: user.is_some(),
    })
}

pub async fn login_page(user: Option<CurrentUser>) -> impl IntoResponse {
    page("login", user)
}

pub async fn signup_page(user: Option<CurrentUser>) -> impl IntoResponse {
    page("signup", user)
}

pub async fn forget_password_page(user: Option<CurrentUser>) -> impl IntoResponse {
    page("forget_password", user)
}

pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedForm(payload): ValidatedForm<LoginForm>,
) -> Result<impl IntoResponse, AuthFailure> {
    let session = state
        .provider
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Sign-in failed");
            AuthFailure::from(e)
        })?;

    tracing::info!(
        user_id = %session.user.id,
        email = %session.user.email,
        "User logged in successfully"
    );

    let jar = with_cookies(jar, state.cookies.issue(&session.tokens));
    Ok((jar, Json(ActionResult::redirect(HOME_PATH))))
}

pub async fn signup_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedForm(payload): ValidatedForm<SignupForm>,
) -> Result<impl IntoResponse, AuthFailure> {
    let outcome = state
        .provider
        .sign_up(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Sign-up failed");
            AuthFailure::from(e)
        })?;

    tracing::info!(user_id = %outcome.user.id, email = %outcome.user.email, "Signup successful");

    // Accounts awaiting email confirmation get no session yet.
    let jar = match &outcome.session {
        Some(session) => with_cookies(jar, state.cookies.issue(&session.tokens)),
        None => jar,
    };
    Ok((jar, Json(ActionResult::redirect(HOME_PATH))))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> impl IntoResponse {
    // The guard has already swapped in rotated tokens, so this is current.
    if let Some(access_token) = jar.get(state.cookies.access_name()) {
        // Logout never fails because of the provider; the session is dropped locally regardless
        match state.provider.sign_out(access_token.value()).await {
            Ok(()) => tracing::info!(user_id = %user.id, "Session revoked"),
            Err(e) => tracing::error!(user_id = %user.id, error = %e, "Failed to revoke session"),
        }
    }

    let jar = with_cookies(jar, state.cookies.clear());
    (jar, Json(ActionResult::redirect(LOGIN_PATH)))
}
