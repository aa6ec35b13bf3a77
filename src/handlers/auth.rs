//! HTTP endpoints for account sign-up, sign-in, token refresh and sign-out

use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::auth::session::SessionManager;
use crate::auth::token::{extract_bearer_token, VerifiedToken};
use crate::constants::{API_PREFIX, API_VERSION};
use crate::error::AuthMeError;
use crate::handlers::requests::{SignInRequest, SignUpRequest};
use crate::security::AuthTimer;

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// RFC 7807 style error body
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ProblemDetails {
    pub fn new(status: StatusCode, errors: Vec<String>) -> Self {
        Self {
            kind: format!("https://httpstatuses.io/{}", status.as_u16()),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            errors,
        }
    }
}

fn problem(status: StatusCode, errors: Vec<String>) -> Response {
    warp::reply::with_status(warp::reply::json(&ProblemDetails::new(status, errors)), status).into_response()
}

fn json_with_status<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

/// Infrastructure failures stay opaque to the caller
fn internal_error(context: &str, err: AuthMeError) -> Response {
    log::error!("{} failed: {}", context, err);
    problem(StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
}

fn with_sessions(
    sessions: Arc<SessionManager>,
) -> impl Filter<Extract = (Arc<SessionManager>,), Error = Infallible> + Clone {
    warp::any().map(move || sessions.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Resolve the bearer token of a request to a live session, or answer 401
async fn authenticate_bearer(
    auth_header: Option<String>,
    sessions: &SessionManager,
) -> Result<VerifiedToken, Response> {
    let token = match auth_header.as_deref().and_then(extract_bearer_token) {
        Some(token) => token,
        None => return Err(StatusCode::UNAUTHORIZED.into_response()),
    };

    match sessions.authenticate_token(&token).await {
        Ok(Some(verified)) => Ok(verified),
        Ok(None) => Err(StatusCode::UNAUTHORIZED.into_response()),
        Err(e) => Err(internal_error("Token authentication", e)),
    }
}

pub async fn handle_sign_up(
    request: SignUpRequest,
    sessions: Arc<SessionManager>,
) -> Result<Response, Infallible> {
    let credentials = match request.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(problem(StatusCode::BAD_REQUEST, errors)),
    };

    let response = match sessions.sign_up(&credentials.email, &credentials.password).await {
        Ok(result) if result.success() => json_with_status(&result, StatusCode::OK),
        Ok(result) => problem(StatusCode::BAD_REQUEST, result.errors().to_vec()),
        Err(e) => internal_error("Sign-up", e),
    };
    Ok(response)
}

pub async fn handle_sign_in(
    request: SignInRequest,
    sessions: Arc<SessionManager>,
    min_auth_duration: Duration,
) -> Result<Response, Infallible> {
    let credentials = match request.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(problem(StatusCode::BAD_REQUEST, errors)),
    };

    let timer = AuthTimer::new(min_auth_duration);
    let response = match sessions.sign_in(&credentials.email, &credentials.password).await {
        Ok(result) if result.success() => return Ok(json_with_status(&result, StatusCode::OK)),
        Ok(result) => json_with_status(&result, StatusCode::UNAUTHORIZED),
        Err(e) => internal_error("Sign-in", e),
    };
    timer.wait().await;
    Ok(response)
}

pub async fn handle_refresh_token(
    auth_header: Option<String>,
    sessions: Arc<SessionManager>,
) -> Result<Response, Infallible> {
    let verified = match authenticate_bearer(auth_header, &sessions).await {
        Ok(verified) => verified,
        Err(response) => return Ok(response),
    };

    let response = match sessions.sign_in_without_password(&verified.claims.subject).await {
        Ok(result) if result.success() => json_with_status(&result, StatusCode::OK),
        Ok(result) => json_with_status(&result, StatusCode::UNAUTHORIZED),
        Err(e) => internal_error("Token refresh", e),
    };
    Ok(response)
}

pub async fn handle_sign_out(
    auth_header: Option<String>,
    sessions: Arc<SessionManager>,
) -> Result<Response, Infallible> {
    let verified = match authenticate_bearer(auth_header, &sessions).await {
        Ok(verified) => verified,
        Err(response) => return Ok(response),
    };

    let response = match sessions.sign_out(&verified.claims.subject).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Sign-out", e),
    };
    Ok(response)
}

/// Turn unmatched routes and malformed bodies into problem responses
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let response = if err.is_not_found() {
        problem(StatusCode::NOT_FOUND, Vec::new())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        problem(StatusCode::BAD_REQUEST, vec![e.to_string()])
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        problem(StatusCode::PAYLOAD_TOO_LARGE, Vec::new())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        problem(StatusCode::METHOD_NOT_ALLOWED, Vec::new())
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        problem(StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
    };
    Ok(response)
}

/// All account routes under `/api/v1/user`, plus `/health`
pub fn auth_routes(
    sessions: Arc<SessionManager>,
    min_auth_duration: Duration,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let user = warp::path(API_PREFIX)
        .and(warp::path(API_VERSION))
        .and(warp::path("user"));

    let sign_up = user
        .clone()
        .and(warp::path("sign-up"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<SignUpRequest>())
        .and(with_sessions(sessions.clone()))
        .and_then(handle_sign_up);

    let sign_in = user
        .clone()
        .and(warp::path("sign-in"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<SignInRequest>())
        .and(with_sessions(sessions.clone()))
        .and(warp::any().map(move || min_auth_duration))
        .and_then(handle_sign_in);

    let refresh = user
        .clone()
        .and(warp::path("refresh-token"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_sessions(sessions.clone()))
        .and_then(handle_refresh_token);

    let sign_out = user
        .and(warp::path("sign-out"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_sessions(sessions))
        .and_then(handle_sign_out);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK".into_response());

    sign_up
        .or(sign_in)
        .unify()
        .or(refresh)
        .unify()
        .or(sign_out)
        .unify()
        .or(health)
        .unify()
        .recover(handle_rejection)
        .unify()
}
