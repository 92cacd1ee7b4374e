use axum::{response::IntoResponse, Json};
use serde::Serialize;

use crate::models::user::CurrentUser;

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub email: String,
    pub name: String,
    pub initials: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub email: String,
    /// RFC 3339, or "Never" for accounts that have not signed in yet.
    pub last_sign_in_at: String,
    pub roles: Vec<String>,
}

pub async fn dashboard_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(DashboardView {
        name: user.name(),
        initials: user.initials(),
        email: user.email,
        roles: user.roles,
    })
}

pub async fn personal_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(ProfileView {
        last_sign_in_at: user
            .last_sign_in_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "Never".to_string()),
        id: user.id,
        email: user.email,
        roles: user.roles,
    })
}
