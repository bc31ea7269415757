//!
//! casgate axum adapter
//! --------------------
//! Plugs the CAS decision engine into an axum application.
//!
//! Responsibilities:
//! - Cookie-addressed sessions backed by the in-memory [`SessionStore`].
//! - `bounce`/`block` middleware that turn a [`GatewayResponse`] into an HTTP response.
//! - Logout handler.
//! - A small demo application used by the `casgate_server` binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::identity::{AuthMode, CasGateway, CasPrincipal, GatewayRequest, GatewayResponse, SessionStore, StoredSession};

pub const SESSION_COOKIE: &str = "casgate_session";

/// Shared state injected into the middleware and the logout handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CasGateway>,
    pub sessions: SessionStore,
    /// Mark the session cookie `Secure`; on when the service URL is https.
    pub secure_cookie: bool,
}

impl AppState {
    pub fn new(gateway: CasGateway, sessions: SessionStore) -> Self {
        let secure_cookie = gateway.config().service_url().starts_with("https://");
        Self { gateway: Arc::new(gateway), sessions, secure_cookie }
    }
}

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

fn session_cookie(sid: &str, secure: bool) -> Option<HeaderValue> {
    // Lax, not Strict: the browser must send it on the top-level redirect back from CAS
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Lax; Path=/{}", SESSION_COOKIE, sid, secure)).ok()
}

fn clear_session_cookie(secure: bool) -> Option<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/{}",
        SESSION_COOKIE, secure
    )).ok()
}

fn attach_cookie(state: &AppState, session: &StoredSession, response: &mut Response) {
    let value = if session.destroyed() {
        clear_session_cookie(state.secure_cookie)
    } else if session.issued() {
        session.sid().and_then(|sid| session_cookie(sid, state.secure_cookie))
    } else {
        None
    };
    if let Some(v) = value {
        response.headers_mut().append(header::SET_COOKIE, v);
    }
}

/// Render a non-`Continue` decision.
fn into_http(decision: GatewayResponse) -> Response {
    match decision {
        GatewayResponse::Redirect(url) => match HeaderValue::from_str(&url) {
            Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            Err(_) => {
                warn!(target: "casgate::server", "refusing redirect to non-header-safe location");
                (StatusCode::BAD_REQUEST, "bad request").into_response()
            }
        },
        GatewayResponse::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::UNAUTHORIZED);
            (status, status.canonical_reason().unwrap_or("unauthorized")).into_response()
        }
        GatewayResponse::Continue => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn guard(state: AppState, mode: AuthMode, mut request: Request, next: Next) -> Response {
    let sid = parse_cookie(request.headers(), SESSION_COOKIE);
    let mut session = state.sessions.open(sid.as_deref());
    let greq = GatewayRequest::from_parts(request.uri().path(), request.uri().query());

    let decision = state.gateway.authorize(mode, &greq, &mut session).await;
    if let Some(e) = session.failure() {
        error!(target: "casgate::server", "session unavailable path={}: {}", greq.path, e);
        return into_http(GatewayResponse::Status(e.http_status()));
    }

    let mut response = match decision {
        GatewayResponse::Continue => {
            if let Some(principal) = state.gateway.current_principal(&session) {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        other => into_http(other),
    };
    attach_cookie(&state, &session, &mut response);
    response
}

/// Unauthenticated requests are sent through the CAS login flow.
pub async fn bounce_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard(state, AuthMode::Bounce, request, next).await
}

/// Unauthenticated requests get 401.
pub async fn block_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard(state, AuthMode::Block, request, next).await
}

pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let sid = parse_cookie(&headers, SESSION_COOKIE);
    let mut session = state.sessions.open(sid.as_deref());
    let mut response = into_http(state.gateway.logout(&mut session));
    attach_cookie(&state, &session, &mut response);
    response
}

/// Put every route of `router` behind the gateway in the given mode.
pub fn protect<S>(router: Router<S>, state: AppState, mode: AuthMode) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    match mode {
        AuthMode::Bounce => router.route_layer(middleware::from_fn_with_state(state, bounce_middleware)),
        AuthMode::Block => router.route_layer(middleware::from_fn_with_state(state, block_middleware)),
    }
}

async fn secure_page(Extension(principal): Extension<CasPrincipal>) -> String {
    format!("hello {}", principal.user)
}

async fn whoami(Extension(principal): Extension<CasPrincipal>) -> Json<CasPrincipal> {
    Json(principal)
}

/// Demo application: `/` public, `/secure` bounced, `/api/whoami` blocked, `/logout`.
pub fn app(state: AppState) -> Router {
    let pages: Router<AppState> = Router::new().route("/secure", get(secure_page));
    let api: Router<AppState> = Router::new().route("/api/whoami", get(whoami));
    Router::new()
        .route("/", get(|| async { "casgate ok" }))
        .merge(protect(pages, state.clone(), AuthMode::Bounce))
        .merge(protect(api, state.clone(), AuthMode::Block))
        .route("/logout", get(logout_handler))
        .with_state(state)
}

fn log_startup_config(cfg: &GatewayConfig, addr: &SocketAddr) {
    info!(
        target: "startup",
        "casgate starting: bind={}, cas_url={}, cas_version={}, service_url={}, tls={}, renew={}, gateway={}",
        addr, cfg.cas_url(), cfg.version(), cfg.service_url(), cfg.uses_tls(), cfg.renew(), cfg.gateway()
    );
    info!(
        target: "startup",
        "session: key={}, info_key={:?}, destroy_on_logout={}, validation_timeout_secs={}",
        cfg.session_key(), cfg.session_info_key(), cfg.destroy_session_on_logout(), cfg.validation_timeout().as_secs()
    );
    if cfg.dev_mode() {
        warn!(target: "startup", "DEV MODE enabled: every request is authenticated as '{}'", cfg.dev_mode_user());
    }
}

/// Build the gateway from `config` and serve the demo app on `addr`.
pub async fn run_with_config(config: GatewayConfig, addr: SocketAddr) -> anyhow::Result<()> {
    log_startup_config(&config, &addr);

    let sessions = SessionStore::default();
    let state = AppState::new(CasGateway::new(config)?, sessions.clone());

    // Background sweep of expired sessions
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let removed = sessions.sweep();
            if removed > 0 { tracing::debug!(target: "casgate::session", removed = removed, "session_sweep"); }
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "casgate::server", "Listening on {}", addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cookie_finds_named_value() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; casgate_session=abc123; other=1"));
        assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn status_and_redirect_rendering() {
        let r = into_http(GatewayResponse::Status(401));
        assert_eq!(r.status(), StatusCode::UNAUTHORIZED);
        let r = into_http(GatewayResponse::Redirect("https://cas.example.org/cas/logout".into()));
        assert_eq!(r.status(), StatusCode::FOUND);
        assert_eq!(r.headers().get(header::LOCATION).unwrap(), "https://cas.example.org/cas/logout");
        let r = into_http(GatewayResponse::Redirect("/evil\r\nSet-Cookie: x=1".into()));
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cookie_flags() {
        let v = session_cookie("sid1", true).unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("casgate_session=sid1;"));
        assert!(s.contains("HttpOnly") && s.contains("SameSite=Lax") && s.ends_with("; Secure"));
        let v = session_cookie("sid1", false).unwrap();
        assert!(!v.to_str().unwrap().contains("Secure"));
    }
}
