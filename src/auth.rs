use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, RequestParts};
use axum::headers::authorization::Bearer;
use axum::headers::{Authorization, Cookie, HeaderMapExt};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::models::{Identity, Role, User};
use crate::policy::{authorize, Action};
use crate::{created, proceeds, AppState, Created, Error, Payload, Success};

pub const TOKEN_COOKIE: &str = "token";

/// Token presented with the request. The cookie wins over the `Authorization` header.
pub fn presented_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(TOKEN_COOKIE).map(str::to_string))
        .filter(|token| !token.is_empty());
    from_cookie.or_else(|| {
        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().to_string())
    })
}

#[async_trait]
impl<B> FromRequest<B> for Identity
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(state) = Extension::<AppState>::from_request(req)
            .await
            .map_err(|err| Error::internal("ExtensionError", err.to_string()))?;

        let token = presented_token(req.headers()).ok_or_else(|| Error::AuthenticationRequired {
            message: "Authentication required".to_string(),
        })?;
        Ok(state.tokens.verify(&token)?)
    }
}

fn session_cookie(state: &AppState, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax{}",
        TOKEN_COOKIE,
        token,
        state.tokens.ttl().num_seconds(),
        if state.secure_cookies { "; Secure" } else { "" }
    )
}

pub async fn login(
    Extension(state): Extension<AppState>,
    body: Result<Json<LoginTeacher>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(login) = body?;
    let user = state
        .credentials
        .authenticate(&login.username, &login.password)
        .await?;

    let token = state.tokens.issue(&user.identity())?;
    log::info!("User `{}` ({}) logged in", user.username, user.role);

    Ok((
        [(SET_COOKIE, session_cookie(&state, &token))],
        Json(Success::of(LoggedIn {
            id: user.id,
            username: user.username,
            role: user.role,
            token,
        })),
    ))
}

/// Clears the cookie only. The token itself stays valid until it expires.
pub async fn logout() -> impl IntoResponse {
    (
        [(
            SET_COOKIE,
            format!("{}=; HttpOnly; Path=/; Max-Age=0", TOKEN_COOKIE),
        )],
        Json(Success::of(Message {
            message: "Logged out successfully".to_string(),
        })),
    )
}

pub async fn create_teacher(
    identity: Identity,
    Extension(state): Extension<AppState>,
    body: Result<Json<CreateTeacher>, JsonRejection>,
) -> Created<CreatedTeacher> {
    authorize(&identity, Action::ManageUsers, None)?;
    let Json(teacher) = body?;

    let user = state
        .credentials
        .create(&teacher.username, &teacher.password, Role::Teacher)
        .await?;
    log::info!("Admin `{}` created teacher `{}`", identity.username, user.username);

    created(CreatedTeacher {
        id: user.id,
        username: user.username,
        role: user.role,
    })
}

pub async fn list_teachers(
    identity: Identity,
    Extension(state): Extension<AppState>,
) -> Payload<TeacherList> {
    authorize(&identity, Action::ManageUsers, None)?;

    proceeds(TeacherList {
        users: state.credentials.teachers().await?,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginTeacher {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedIn {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeacher {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedTeacher {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherList {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use axum::http::HeaderValue;

    #[test]
    fn cookie_preferred_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(presented_token(&headers).as_deref(), Some("from-header"));

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(presented_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn empty_cookie_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token="));
        assert_eq!(presented_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(presented_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn non_bearer_schemes_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(presented_token(&headers), None);
    }
}
