use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use ltigate_auth::config::ConsumerConfig;
use ltigate_auth::oauth1::OAuthSigner;
use ltigate_auth::session::SessionAttributes;
use ltigate_auth::{Consumer, InMemorySessionStore, LtiConfig, SessionStore, UrlFixupTable};
use ltigate_server::ServerBuilder;
use ltigate_server::config::AppConfig;
use serde_json::json;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "__consumer_key__";
const SECRET: &str = "__lti_secret__";
const SOURCEDID: &str = "MITx/ODL_ENG/2014_T1:edge.edx.org-i4x-MITx-ODL_ENG-lti-94173d3e:0084";

struct TestApp {
    router: Router,
    store: Arc<InMemorySessionStore>,
}

fn lti_config(url_fix: UrlFixupTable) -> LtiConfig {
    let mut lti = LtiConfig::default();
    lti.consumers.insert(
        KEY.to_string(),
        ConsumerConfig {
            secret: SECRET.to_string(),
        },
    );
    lti.url_fix = url_fix;
    lti
}

fn test_app_with(url_fix: UrlFixupTable) -> TestApp {
    let store = Arc::new(InMemorySessionStore::new());
    let cfg = AppConfig {
        lti: lti_config(url_fix),
        ..AppConfig::default()
    };
    let server = ServerBuilder::new()
        .with_config(cfg)
        .with_session_store(store.clone())
        .build()
        .expect("server builds");
    TestApp {
        router: server.router(),
        store,
    }
}

fn test_app() -> TestApp {
    test_app_with(UrlFixupTable::new())
}

fn launch_params(outcome_url: &str) -> Vec<(String, String)> {
    [
        ("resource_link_id", "edge.edx.org-i4x-MITx-ODL_ENG-lti-94173d3e"),
        ("user_id", "008437924c9852377e8994829aaac7a1"),
        ("roles", "Instructor"),
        ("lis_result_sourcedid", SOURCEDID),
        ("context_id", "MITx/ODL_ENG/2014_T1"),
        ("lti_version", "LTI-1p0"),
        ("launch_presentation_return_url", ""),
        ("lis_outcome_service_url", outcome_url),
        ("lti_message_type", "basic-lti-launch-request"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn signed_uri(path: &str, params: &[(String, String)], key: &str, secret: &str) -> String {
    let url = Url::parse(&format!("http://localhost{path}")).unwrap();
    let signed = OAuthSigner::new(Consumer::new(key, secret)).sign_url("GET", &url, params);
    format!("{}?{}", signed.path(), signed.query().unwrap_or(""))
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header(header::HOST, "localhost");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(ToString::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, cookie, String::from_utf8(body.to_vec()).unwrap())
}

async fn setup_session(app: &TestApp) -> String {
    let mut attrs = SessionAttributes::new();
    attrs.insert("lti_authenticated".into(), json!(true));
    attrs.insert("oauth_consumer_key".into(), json!(KEY));
    app.store.set("seeded", attrs).await.unwrap();
    "lti_session=seeded".to_string()
}

#[tokio::test]
async fn unknown_protection_is_rejected() {
    let app = test_app();
    let (status, _, body) = send(&app, get("/unknown_protection", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Unknown request type"));
}

#[tokio::test]
async fn no_credentials_any() {
    let app = test_app();
    let (status, _, body) = send(&app, get("/any", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("This page requires a valid oauth session or request"));
}

#[tokio::test]
async fn no_credentials_session() {
    let app = test_app();
    let (status, _, body) = send(&app, get("/session", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Session expired or unavailable"));
}

#[tokio::test]
async fn no_credentials_initial_get_and_post() {
    let app = test_app();
    let (status, _, body) = send(&app, get("/initial", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("This page requires a valid oauth session or request"));

    let request = Request::builder()
        .method("POST")
        .uri("/initial")
        .header(header::HOST, "localhost")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("user_id=1"))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn form_body_over_server_limit_is_rejected() {
    let mut cfg = AppConfig {
        lti: lti_config(UrlFixupTable::new()),
        ..AppConfig::default()
    };
    cfg.server.body_limit_bytes = 64;
    let server = ServerBuilder::new()
        .with_config(cfg)
        .build()
        .expect("server builds");

    let request = Request::builder()
        .method("POST")
        .uri("/initial")
        .header(header::HOST, "localhost")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("user_id={}", "x".repeat(128))))
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn seeded_session_grants_session_route() {
    let app = test_app();
    let cookie = setup_session(&app).await;
    let (status, set_cookie, body) = send(&app, get("/session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hi");
    assert!(set_cookie.is_none());
}

#[tokio::test]
async fn close_session_revokes_trust() {
    let app = test_app();
    let cookie = setup_session(&app).await;

    let (status, _, body) = send(&app, get("/close_session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "session closed");

    let (status, _, body) = send(&app, get("/session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Session expired or unavailable"));
}

#[tokio::test]
async fn signed_launch_initial() {
    let app = test_app();
    let uri = signed_uri("/initial", &launch_params("https://lms.invalid/grade"), KEY, SECRET);

    let (status, cookie, body) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hi 008437924c9852377e8994829aaac7a1");

    let cookie = cookie.expect("launch issues a session cookie");
    let (status, _, _) = send(&app, get("/session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn signed_launch_any() {
    let app = test_app();
    let uri = signed_uri("/any", &launch_params("https://lms.invalid/grade"), KEY, SECRET);
    let (status, cookie, _) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());
}

#[tokio::test]
async fn tampered_launch_is_rejected() {
    let app = test_app();
    let uri = signed_uri("/initial", &launch_params("https://lms.invalid/grade"), KEY, SECRET);
    let (status, cookie, body) = send(&app, get(&format!("{uri}&FAIL=TRUE"), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("OAuth error: Please check your key and secret"));
    assert!(cookie.is_none());
}

#[tokio::test]
async fn wrong_secret_and_unknown_key_look_alike() {
    let app = test_app();
    let params = launch_params("https://lms.invalid/grade");

    let bad_secret = signed_uri("/initial", &params, KEY, "not-the-secret");
    let unknown_key = signed_uri("/initial", &params, "stranger", SECRET);

    let (s1, _, b1) = send(&app, get(&bad_secret, None)).await;
    let (s2, _, b2) = send(&app, get(&unknown_key, None)).await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!((s1, b1), (s2, b2));
}

#[tokio::test]
async fn tampered_launch_invalidates_existing_session() {
    let app = test_app();
    let cookie = setup_session(&app).await;

    let uri = signed_uri("/initial", &launch_params("https://lms.invalid/grade"), KEY, SECRET);
    let (status, _, _) = send(&app, get(&format!("{uri}&FAIL=TRUE"), Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app, get("/session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn any_keeps_trusted_session_despite_bad_signature() {
    let app = test_app();
    let cookie = setup_session(&app).await;

    let uri = signed_uri("/any", &launch_params("https://lms.invalid/grade"), KEY, SECRET);
    let (status, set_cookie, _) = send(&app, get(&format!("{uri}&FAIL=TRUE"), Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(set_cookie.is_none());
}

#[tokio::test]
async fn post_grade_after_launch() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/grade_handler"))
        .respond_with(ResponseTemplate::new(200).set_body_string("success"))
        .expect(1)
        .mount(&mock)
        .await;

    let app = test_app();
    let outcome_url = format!("{}/grade_handler", mock.uri());
    let uri = signed_uri("/initial", &launch_params(&outcome_url), KEY, SECRET);
    let (status, cookie, _) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();

    let (status, _, body) = send(&app, get("/post_grade/1.0", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "grade=true");

    // Out of range: no request leaves the server.
    let (_, _, body) = send(&app, get("/post_grade/2.0", Some(&cookie))).await;
    assert_eq!(body, "grade=false");
}

#[tokio::test]
async fn post_grade_with_url_fix() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/grade_handler"))
        .respond_with(ResponseTemplate::new(200).set_body_string("success"))
        .expect(1)
        .mount(&mock)
        .await;

    let advertised = "https://localhost:8000/dev_stack";
    let table = UrlFixupTable::new().with_rule(
        "https://localhost:8000/",
        advertised,
        format!("{}/grade_handler", mock.uri()),
    );
    let app = test_app_with(table);

    let uri = signed_uri("/initial", &launch_params(advertised), KEY, SECRET);
    let (_, cookie, _) = send(&app, get(&uri, None)).await;

    let (_, _, body) = send(&app, get("/post_grade/1.0", Some(&cookie.unwrap()))).await;
    assert_eq!(body, "grade=true");
}

#[tokio::test]
async fn post_grade_requires_session() {
    let app = test_app();
    let (status, _, _) = send(&app, get("/post_grade/1.0", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
