use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;
use warp::Filter;

use authme::auth::SessionManager;
use authme::config::JwtOptions;
use authme::handlers::auth_routes;
use authme::storage::{MemoryTokenCache, MemoryUserStore};

const SECRET: &str = "handler_signing_key_0d4b8e61_f29c_7a35";
const PASSWORD: &str = "Sup3r!secret";

fn routes() -> impl Filter<Extract = (warp::reply::Response,), Error = std::convert::Infallible> + Clone + 'static
{
    let options = JwtOptions::new(SECRET, "authme-tests", "authme-test-clients")
        .with_access_token_ttl(Duration::from_secs(900))
        .with_refresh_token_ttl(Duration::from_secs(3600));
    let sessions = SessionManager::new(
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemoryTokenCache::new()),
        options,
    )
    .unwrap();
    auth_routes(Arc::new(sessions), Duration::from_millis(10))
}

fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let api = routes();
    let resp = warp::test::request().method("GET").path("/health").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.body(), "OK");
}

#[tokio::test]
async fn test_sign_up_then_sign_in() {
    let api = routes();

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-up")
        .json(&json!({
            "email": "alice@example.com",
            "password": PASSWORD,
            "passwordConfirmation": PASSWORD
        }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body(&resp);
    assert_eq!(created["success"], true);
    assert!(created.get("accessToken").is_none());

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-in")
        .json(&json!({ "email": "alice@example.com", "password": PASSWORD }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let signed_in = body(&resp);
    assert_eq!(signed_in["success"], true);
    assert!(signed_in["accessToken"].is_string());
    assert!(signed_in["refreshToken"].is_string());
    assert_eq!(signed_in["errors"], json!([]));
}

#[tokio::test]
async fn test_sign_up_validation_errors() {
    let api = routes();
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-up")
        .json(&json!({
            "email": "not-an-email",
            "password": PASSWORD,
            "passwordConfirmation": "Different!1"
        }))
        .reply(&api)
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let problem = body(&resp);
    assert_eq!(problem["status"], 400);
    let errors = problem["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e == "The Email field is invalid"));
    assert!(errors.iter().any(|e| e == "Passwords must match"));
}

#[tokio::test]
async fn test_duplicate_sign_up_is_bad_request() {
    let api = routes();
    let request = json!({
        "email": "bob@example.com",
        "password": PASSWORD,
        "passwordConfirmation": PASSWORD
    });

    for expected in [StatusCode::OK, StatusCode::BAD_REQUEST] {
        let resp = warp::test::request()
            .method("POST")
            .path("/api/v1/user/sign-up")
            .json(&request)
            .reply(&api)
            .await;
        assert_eq!(resp.status(), expected);
    }
}

#[tokio::test]
async fn test_bad_credentials_unauthorized() {
    let api = routes();
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-in")
        .json(&json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .reply(&api)
        .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let result = body(&resp);
    assert_eq!(result["success"], false);
    assert_eq!(result["errors"], json!(["Username or password is incorrect"]));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let api = routes();
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-in")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_and_sign_out_flow() {
    let api = routes();

    warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-up")
        .json(&json!({
            "email": "carol@example.com",
            "password": PASSWORD,
            "passwordConfirmation": PASSWORD
        }))
        .reply(&api)
        .await;

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-in")
        .json(&json!({ "email": "carol@example.com", "password": PASSWORD }))
        .reply(&api)
        .await;
    let refresh_token = body(&resp)["refreshToken"].as_str().unwrap().to_string();

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/refresh-token")
        .header("authorization", format!("Bearer {}", refresh_token))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let access_token = body(&resp)["accessToken"].as_str().unwrap().to_string();

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-out")
        .header("authorization", format!("Bearer {}", access_token))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Every token of the subject is gone after sign-out
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/refresh-token")
        .header("authorization", format!("Bearer {}", refresh_token))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_bearer_unauthorized() {
    let api = routes();
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/user/sign-out")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_not_found() {
    let api = routes();
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/user/profile")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
