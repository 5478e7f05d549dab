//! The `lti_guard` middleware and the `Lti` extractor.
//!
//! Every protected route declares its access mode when the layer is built:
//!
//! ```ignore
//! Router::new()
//!     .route("/session", get(handler))
//!     .route_layer(from_fn_with_state(lti.route("session"), lti_guard))
//! ```
//!
//! The middleware rebuilds the [`LaunchRequest`] from the HTTP request,
//! runs [`AccessGuard::authorize`] and either forwards to the handler with an
//! [`Lti`] extension or answers with the registered error handler. A new
//! session id issued by a launch is sent back as an `HttpOnly` cookie.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use url::Url;

use super::error::default_error_handler;
use crate::config::{ConfigError, LtiConfig, SessionConfig};
use crate::consumer::ConsumerRegistry;
use crate::error::LtiError;
use crate::guard::{AccessGuard, AccessMode, Lti};
use crate::outcome::OutcomeClient;
use crate::session::SessionStore;
use crate::verifier::{LaunchRequest, SignatureVerifier};

/// Default upper bound for a buffered form body.
pub const DEFAULT_FORM_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Renders an authorization failure into the response sent to the caller.
pub type ErrorHandler = Arc<dyn Fn(LtiError) -> Response + Send + Sync>;

/// Shared state of the LTI middleware.
#[derive(Clone)]
pub struct LtiState {
    guard: Arc<AccessGuard>,
    error_handler: ErrorHandler,
    session: SessionConfig,
    public_base_url: Option<Url>,
    body_limit: usize,
}

impl LtiState {
    /// Creates middleware state around an existing guard.
    pub fn new(guard: Arc<AccessGuard>, session: SessionConfig) -> Self {
        Self {
            guard,
            error_handler: Arc::new(default_error_handler),
            session,
            public_base_url: None,
            body_limit: DEFAULT_FORM_BODY_LIMIT,
        }
    }

    /// Wires registry, verifier, outcome client and guard from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(
        config: &LtiConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(ConsumerRegistry::from_config(config)?);
        let verifier = SignatureVerifier::new(Arc::clone(&registry), config.oauth.timestamp_skew);
        let outcome = Arc::new(OutcomeClient::new(
            registry,
            config.url_fix.clone(),
            &config.outcome,
        ));
        let guard = Arc::new(AccessGuard::new(verifier, store, outcome));

        let public_base_url = config
            .public_base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| ConfigError::invalid_value("public_base_url", e.to_string()))?;

        Ok(Self {
            public_base_url,
            ..Self::new(guard, config.session.clone())
        })
    }

    /// Sets the externally visible base URL used to rebuild request URLs.
    #[must_use]
    pub fn with_public_base_url(mut self, url: Url) -> Self {
        self.public_base_url = Some(url);
        self
    }

    /// Sets the largest form body the middleware buffers for signature checks.
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Replaces the error handler.
    #[must_use]
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(LtiError) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    /// The access guard.
    #[must_use]
    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.guard
    }

    /// Route state for a declared access mode.
    ///
    /// An unknown declaration is not rejected here; every request to the
    /// route fails with `UnknownRequestType` instead.
    #[must_use]
    pub fn route(&self, declared: &str) -> LtiRoute {
        let mode = AccessMode::from_declared(Some(declared));
        if mode.is_none() {
            tracing::warn!(declared, "Unknown LTI access mode declared on route");
        }
        LtiRoute {
            state: self.clone(),
            mode,
        }
    }

    /// Route state for a typed access mode.
    #[must_use]
    pub fn mode(&self, mode: AccessMode) -> LtiRoute {
        LtiRoute {
            state: self.clone(),
            mode: Some(mode),
        }
    }

    /// Route state without a declared access mode.
    #[must_use]
    pub fn undeclared(&self) -> LtiRoute {
        LtiRoute {
            state: self.clone(),
            mode: None,
        }
    }

    fn request_url(&self, headers: &HeaderMap, parts_uri: &axum::http::Uri) -> Option<Url> {
        let path_and_query = parts_uri
            .path_and_query()
            .map_or("/", axum::http::uri::PathAndQuery::as_str);

        let base = match &self.public_base_url {
            Some(base) => base.clone(),
            None => {
                let host = headers
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .or_else(|| parts_uri.authority().map(axum::http::uri::Authority::as_str))
                    .unwrap_or("localhost");
                Url::parse(&format!("http://{host}")).ok()?
            }
        };

        base.join(path_and_query).ok()
    }

    fn session_cookie(&self, session_id: &str) -> Cookie<'static> {
        let same_site = if self.session.cross_site {
            SameSite::None
        } else {
            SameSite::Lax
        };

        Cookie::build((self.session.cookie_name.clone(), session_id.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.session.cross_site)
            .same_site(same_site)
            .build()
    }
}

/// Middleware state for one protected route.
#[derive(Clone)]
pub struct LtiRoute {
    state: LtiState,
    mode: Option<AccessMode>,
}

impl LtiRoute {
    /// Declared access mode, `None` if missing or unknown.
    #[must_use]
    pub fn access_mode(&self) -> Option<AccessMode> {
        self.mode
    }
}

/// Authorizes the request for the route's access mode.
pub async fn lti_guard(State(route): State<LtiRoute>, request: Request, next: Next) -> Response {
    let LtiRoute { state, mode } = route;

    let Some(mode) = mode else {
        return reject(&state, LtiError::UnknownRequestType);
    };

    let (mut parts, body) = request.into_parts();

    let Some(url) = state.request_url(&parts.headers, &parts.uri) else {
        return (StatusCode::BAD_REQUEST, "Invalid request URL").into_response();
    };

    let (body, form) = if is_form(&parts.headers) {
        match to_bytes(body, state.body_limit).await {
            Ok(bytes) => {
                let form: Vec<(String, String)> = url::form_urlencoded::parse(&bytes)
                    .into_owned()
                    .collect();
                (Body::from(bytes), form)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read form body");
                return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
            }
        }
    } else {
        (body, Vec::new())
    };

    let mut launch = LaunchRequest::new(parts.method.as_str(), url).with_form_params(form);
    if let Some(auth) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        launch = launch.with_authorization_header(auth);
    }

    let jar = CookieJar::from_headers(&parts.headers);
    let presented = jar
        .get(&state.session.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let lti = match state
        .guard
        .authorize(Some(mode), presented.as_deref(), &launch)
        .await
    {
        Ok(lti) => lti,
        Err(e) => return reject(&state, e),
    };

    let rotated = presented.as_deref() != Some(lti.session_id());
    let cookie = state.session_cookie(lti.session_id());
    parts.extensions.insert(lti);

    let response = next.run(Request::from_parts(parts, body)).await;

    if rotated {
        (jar.add(cookie), response).into_response()
    } else {
        response
    }
}

fn reject(state: &LtiState, error: LtiError) -> Response {
    if error.is_server_error() {
        tracing::error!(category = ?error.category(), detail = %error.detail(), "LTI authorization failed");
    } else {
        tracing::warn!(category = ?error.category(), detail = %error.detail(), "LTI authorization rejected");
    }
    (state.error_handler)(error)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Extracts the authorized [`Lti`] handle inserted by [`lti_guard`].
///
/// Fails with `UnknownRequestType` when the route is not behind the guard.
impl<S> FromRequestParts<S> for Lti
where
    S: Send + Sync,
{
    type Rejection = LtiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Lti>()
            .cloned()
            .ok_or(LtiError::UnknownRequestType)
    }
}
