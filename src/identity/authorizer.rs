use std::sync::Arc;

use tracing::{error, info, warn};

use super::principal::{Attrs, CasPrincipal};
use super::request_context::{GatewayRequest, GatewayResponse};
use super::session::Session;
use crate::cas::{HttpTicketValidator, RedirectBuilder, TicketValidator, ValidationOutcome};
use crate::config::GatewayConfig;
use crate::error::CasResult;

/// Session key holding the path to return to after the CAS login round-trip.
pub const RETURN_TO_KEY: &str = "cas_return_to";

/// What to do with an unauthenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Send it through the CAS login flow.
    Bounce,
    /// Reject it with 401.
    Block,
}

/// Per-request CAS decision engine. Holds only read-only configuration, so one instance
/// is shared by every request.
pub struct CasGateway<V = HttpTicketValidator> {
    config: Arc<GatewayConfig>,
    redirects: RedirectBuilder,
    validator: V,
}

impl CasGateway<HttpTicketValidator> {
    pub fn new(config: GatewayConfig) -> CasResult<Self> {
        let config = Arc::new(config);
        let validator = HttpTicketValidator::new(config.clone())?;
        Ok(Self::with_validator(config, validator))
    }
}

impl<V: TicketValidator> CasGateway<V> {
    pub fn with_validator(config: Arc<GatewayConfig>, validator: V) -> Self {
        let redirects = RedirectBuilder::new(config.clone());
        Self { config, redirects, validator }
    }

    pub fn config(&self) -> &GatewayConfig { &self.config }

    pub fn redirects(&self) -> &RedirectBuilder { &self.redirects }

    pub async fn bounce(&self, req: &GatewayRequest, session: &mut dyn Session) -> GatewayResponse {
        self.authorize(AuthMode::Bounce, req, session).await
    }

    pub async fn block(&self, req: &GatewayRequest, session: &mut dyn Session) -> GatewayResponse {
        self.authorize(AuthMode::Block, req, session).await
    }

    /// Decide one request. Checked in order: existing session, dev bypass, block,
    /// ticket exchange, login redirect.
    pub async fn authorize(&self, mode: AuthMode, req: &GatewayRequest, session: &mut dyn Session) -> GatewayResponse {
        if self.current_user(session).is_some() {
            return GatewayResponse::Continue;
        }

        if self.config.dev_mode() && !self.config.dev_mode_user().is_empty() {
            let principal = CasPrincipal::new(self.config.dev_mode_user())
                .with_attributes(self.config.dev_mode_info().clone());
            self.store_principal(session, &principal);
            info!(target: "casgate::authz", "dev mode bypass as user={} path={}", principal.user, req.path);
            return GatewayResponse::Continue;
        }

        if mode == AuthMode::Block {
            info!(target: "casgate::authz", "blocked unauthenticated request path={}", req.path);
            return GatewayResponse::unauthorized();
        }

        match req.ticket() {
            Some(ticket) => self.exchange_ticket(ticket, req, session).await,
            None => self.start_login(req, session),
        }
    }

    async fn exchange_ticket(&self, ticket: &str, req: &GatewayRequest, session: &mut dyn Session) -> GatewayResponse {
        let service = self.config.service_for(&req.path);
        match self.validator.validate(ticket, &service).await {
            ValidationOutcome::Success(principal) => {
                self.store_principal(session, &principal);
                let target = session.remove(RETURN_TO_KEY).unwrap_or_else(|| req.path.clone());
                info!(target: "casgate::authz", "CAS login user={} redirect={}", principal.user, target);
                GatewayResponse::Redirect(target)
            }
            ValidationOutcome::Failure(e) => {
                // Pending return-to is left in place so a fresh login still lands there.
                warn!(
                    target: "casgate::authz",
                    "ticket rejected path={} code={} reason={}",
                    req.path, e.cas_code().unwrap_or("-"), e
                );
                GatewayResponse::Status(e.http_status())
            }
        }
    }

    fn start_login(&self, req: &GatewayRequest, session: &mut dyn Session) -> GatewayResponse {
        let return_to = req.return_to().map(|s| s.to_string()).unwrap_or_else(|| req.path_and_query());
        session.insert(RETURN_TO_KEY, return_to);
        GatewayResponse::Redirect(self.redirects.login_url(&req.path))
    }

    /// Forget the identity (or the whole session) and send the client to CAS logout.
    /// Idempotent; destruction failures are logged and never stop the redirect.
    pub fn logout(&self, session: &mut dyn Session) -> GatewayResponse {
        let user = self.current_user(session);
        if self.config.destroy_session_on_logout() {
            if let Err(e) = session.destroy() {
                error!(target: "casgate::session", "session destroy on logout failed: {}", e);
            }
        } else {
            session.remove(self.config.session_key());
            if let Some(k) = self.config.session_info_key() { session.remove(k); }
        }
        info!(target: "casgate::authz", "logout user={}", user.as_deref().unwrap_or("-"));
        GatewayResponse::Redirect(self.redirects.logout_url())
    }

    /// Authenticated user name, if the session holds a non-empty one.
    pub fn current_user(&self, session: &dyn Session) -> Option<String> {
        session.get(self.config.session_key()).filter(|u| !u.is_empty())
    }

    /// Principal stored in the session, attributes included when configured.
    pub fn current_principal(&self, session: &dyn Session) -> Option<CasPrincipal> {
        let user = self.current_user(session)?;
        let attributes = self.config.session_info_key()
            .and_then(|k| session.get(k))
            .and_then(|raw| serde_json::from_str::<Attrs>(&raw).ok())
            .unwrap_or_default();
        Some(CasPrincipal { user, attributes })
    }

    fn store_principal(&self, session: &mut dyn Session, principal: &CasPrincipal) {
        session.insert(self.config.session_key(), principal.user.clone());
        if let Some(k) = self.config.session_info_key() {
            match serde_json::to_string(&principal.attributes) {
                Ok(json) => session.insert(k, json),
                Err(e) => warn!(target: "casgate::session", "could not store CAS attributes: {}", e),
            }
        }
    }
}
