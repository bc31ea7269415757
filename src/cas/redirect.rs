use std::sync::Arc;

use url::Url;

use crate::config::GatewayConfig;

/// Builds CAS endpoint URLs (`/login`, `/logout`, validation) under the configured base.
#[derive(Debug, Clone)]
pub struct RedirectBuilder {
    config: Arc<GatewayConfig>,
}

impl RedirectBuilder {
    pub fn new(config: Arc<GatewayConfig>) -> Self { Self { config } }

    /// `<casBase><suffix>` with any query or fragment of the base dropped.
    pub fn endpoint(&self, suffix: &str) -> Url {
        let base = self.config.cas_url();
        let mut url = base.clone();
        let path = format!("{}{}", base.path().trim_end_matches('/'), suffix);
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// Login redirect for a client that asked for `return_path`. `renew` and `gateway`
    /// are only sent when enabled.
    pub fn login_url(&self, return_path: &str) -> String {
        let mut url = self.endpoint("/login");
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("service", &self.config.service_for(return_path));
            if self.config.renew() { q.append_pair("renew", "true"); }
            if self.config.gateway() { q.append_pair("gateway", "true"); }
        }
        url.to_string()
    }

    pub fn logout_url(&self) -> String { self.endpoint("/logout").to_string() }

    /// Validation request URL for the configured protocol version.
    pub fn validation_url(&self, ticket: &str, service: &str) -> Url {
        let mut url = self.endpoint(self.config.version().validation_path());
        url.query_pairs_mut().append_pair("service", service).append_pair("ticket", ticket);
        url
    }
}
