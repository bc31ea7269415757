//! Gateway configuration.
//!
//! [`GatewayOptions`] is the raw, loosely typed input (defaults, JSON file, environment,
//! CLI flags). [`GatewayConfig::from_options`] validates it once at startup; the result is
//! immutable and shared for the life of the process.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use url::Url;
use serde::Deserialize;

use crate::cas::ProtocolVersion;
use crate::error::{CasError, CasResult};
use crate::identity::RETURN_TO_KEY;

pub const DEFAULT_SESSION_NAME: &str = "cas_user";
pub const DEFAULT_CAS_VERSION: &str = "3.0";
pub const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayOptions {
    /// CAS server base URL, e.g. `https://cas.example.org/cas`.
    pub cas_url: String,
    /// Base URL of the protected application, e.g. `https://app.example.org`.
    pub service_url: String,
    pub cas_version: String,
    pub renew: bool,
    pub gateway: bool,
    pub dev_mode: bool,
    pub dev_mode_user: String,
    pub dev_mode_info: BTreeMap<String, Vec<String>>,
    /// Session key holding the authenticated user name.
    pub session_name: String,
    /// Session key holding CAS attributes as JSON; attributes are dropped when unset.
    pub session_info: Option<String>,
    pub destroy_session: bool,
    pub validation_timeout_secs: u64,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            cas_url: String::new(),
            service_url: String::new(),
            cas_version: DEFAULT_CAS_VERSION.to_string(),
            renew: false,
            gateway: false,
            dev_mode: false,
            dev_mode_user: String::new(),
            dev_mode_info: BTreeMap::new(),
            session_name: DEFAULT_SESSION_NAME.to_string(),
            session_info: None,
            destroy_session: false,
            validation_timeout_secs: DEFAULT_VALIDATION_TIMEOUT_SECS,
        }
    }
}

pub(crate) fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| parse_bool(&v))
}

impl GatewayOptions {
    pub fn from_json_file(path: &Path) -> CasResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CasError::config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| CasError::config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Overlay `CASGATE_*` environment variables onto these options.
    pub fn merge_env(mut self) -> Self {
        if let Some(v) = env_string("CASGATE_CAS_URL") { self.cas_url = v; }
        if let Some(v) = env_string("CASGATE_SERVICE_URL") { self.service_url = v; }
        if let Some(v) = env_string("CASGATE_CAS_VERSION") { self.cas_version = v; }
        if let Some(v) = env_bool("CASGATE_RENEW") { self.renew = v; }
        if let Some(v) = env_bool("CASGATE_GATEWAY") { self.gateway = v; }
        if let Some(v) = env_bool("CASGATE_DEV_MODE") { self.dev_mode = v; }
        if let Some(v) = env_string("CASGATE_DEV_MODE_USER") { self.dev_mode_user = v; }
        if let Some(v) = env_string("CASGATE_SESSION_NAME") { self.session_name = v; }
        if let Some(v) = env_string("CASGATE_SESSION_INFO") { self.session_info = Some(v); }
        if let Some(v) = env_bool("CASGATE_DESTROY_SESSION") { self.destroy_session = v; }
        if let Some(v) = env_string("CASGATE_VALIDATION_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.validation_timeout_secs = v;
        }
        self
    }

    pub fn from_env() -> Self { Self::default().merge_env() }
}

/// Validated, immutable gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    version: ProtocolVersion,
    cas_url: Url,
    service_url: String,
    renew: bool,
    gateway: bool,
    dev_mode: bool,
    dev_mode_user: String,
    dev_mode_info: BTreeMap<String, Vec<String>>,
    session_key: String,
    session_info_key: Option<String>,
    destroy_session_on_logout: bool,
    validation_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_options(opts: GatewayOptions) -> CasResult<Self> {
        let version: ProtocolVersion = opts.cas_version.parse()?;

        if opts.cas_url.trim().is_empty() {
            return Err(CasError::config("missing CAS base URL"));
        }
        let cas_url = Url::parse(opts.cas_url.trim())
            .map_err(|e| CasError::config(format!("invalid CAS base URL '{}': {}", opts.cas_url, e)))?;
        match cas_url.scheme() {
            "http" | "https" => {}
            other => return Err(CasError::config(format!("unsupported CAS URL scheme '{}'", other))),
        }
        if cas_url.host_str().is_none() {
            return Err(CasError::config(format!("CAS base URL '{}' has no host", opts.cas_url)));
        }

        let service_url = opts.service_url.trim().trim_end_matches('/').to_string();
        if service_url.is_empty() {
            return Err(CasError::config("missing service URL"));
        }
        Url::parse(&service_url)
            .map_err(|e| CasError::config(format!("invalid service URL '{}': {}", opts.service_url, e)))?;

        if opts.session_name.trim().is_empty() {
            return Err(CasError::config("session name must not be empty"));
        }
        if opts.session_name == RETURN_TO_KEY {
            return Err(CasError::config(format!("session name '{}' is reserved", RETURN_TO_KEY)));
        }
        let session_info_key = opts.session_info.filter(|k| !k.trim().is_empty());
        if let Some(k) = session_info_key.as_deref() {
            if k == opts.session_name || k == RETURN_TO_KEY {
                return Err(CasError::config(format!(
                    "session info key '{}' collides with the identity or return-to key",
                    k
                )));
            }
        }

        Ok(Self {
            version,
            cas_url,
            service_url,
            renew: opts.renew,
            gateway: opts.gateway,
            dev_mode: opts.dev_mode,
            dev_mode_user: opts.dev_mode_user,
            dev_mode_info: opts.dev_mode_info,
            session_key: opts.session_name,
            session_info_key,
            destroy_session_on_logout: opts.destroy_session,
            validation_timeout: Duration::from_secs(opts.validation_timeout_secs.max(1)),
        })
    }

    pub fn version(&self) -> ProtocolVersion { self.version }
    pub fn cas_url(&self) -> &Url { &self.cas_url }
    pub fn service_url(&self) -> &str { &self.service_url }
    pub fn renew(&self) -> bool { self.renew }
    pub fn gateway(&self) -> bool { self.gateway }
    pub fn dev_mode(&self) -> bool { self.dev_mode }
    pub fn dev_mode_user(&self) -> &str { &self.dev_mode_user }
    pub fn dev_mode_info(&self) -> &BTreeMap<String, Vec<String>> { &self.dev_mode_info }
    pub fn session_key(&self) -> &str { &self.session_key }
    pub fn session_info_key(&self) -> Option<&str> { self.session_info_key.as_deref() }
    pub fn destroy_session_on_logout(&self) -> bool { self.destroy_session_on_logout }
    pub fn validation_timeout(&self) -> Duration { self.validation_timeout }

    /// True when validation calls to the CAS server go over TLS.
    pub fn uses_tls(&self) -> bool { self.cas_url.scheme() == "https" }

    /// Service URL the CAS server is told about for a given request path.
    pub fn service_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.service_url, path)
        } else {
            format!("{}/{}", self.service_url, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> GatewayOptions {
        GatewayOptions {
            cas_url: "https://cas.example.org/cas".into(),
            service_url: "https://app.example.org/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let cfg = GatewayConfig::from_options(opts()).unwrap();
        assert_eq!(cfg.version(), ProtocolVersion::V3);
        assert_eq!(cfg.session_key(), "cas_user");
        assert_eq!(cfg.service_url(), "https://app.example.org");
        assert!(cfg.uses_tls());
        assert!(!cfg.renew() && !cfg.gateway() && !cfg.dev_mode());
        assert_eq!(cfg.validation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = GatewayConfig::from_options(GatewayOptions { cas_version: "4.0".into(), ..opts() }).unwrap_err();
        assert!(matches!(err, CasError::Configuration(_)));
    }

    #[test]
    fn rejects_bad_cas_url() {
        for url in ["", "not a url", "ftp://cas.example.org/cas", "/relative/cas"] {
            let res = GatewayConfig::from_options(GatewayOptions { cas_url: url.into(), ..opts() });
            assert!(res.is_err(), "{:?} should be rejected", url);
        }
        let plain = GatewayConfig::from_options(GatewayOptions { cas_url: "http://localhost:8443/cas".into(), ..opts() }).unwrap();
        assert!(!plain.uses_tls());
    }

    #[test]
    fn rejects_missing_service_url_and_session_name() {
        assert!(GatewayConfig::from_options(GatewayOptions { service_url: "".into(), ..opts() }).is_err());
        assert!(GatewayConfig::from_options(GatewayOptions { session_name: " ".into(), ..opts() }).is_err());
    }

    #[test]
    fn rejects_colliding_session_keys() {
        let info_is_user = GatewayOptions { session_info: Some("cas_user".into()), ..opts() };
        assert!(matches!(GatewayConfig::from_options(info_is_user), Err(CasError::Configuration(_))));

        let info_is_return = GatewayOptions { session_info: Some(RETURN_TO_KEY.into()), ..opts() };
        assert!(matches!(GatewayConfig::from_options(info_is_return), Err(CasError::Configuration(_))));

        let name_is_return = GatewayOptions { session_name: RETURN_TO_KEY.into(), ..opts() };
        assert!(matches!(GatewayConfig::from_options(name_is_return), Err(CasError::Configuration(_))));

        let renamed = GatewayOptions {
            session_name: "who".into(),
            session_info: Some("cas_user".into()),
            ..opts()
        };
        let cfg = GatewayConfig::from_options(renamed).unwrap();
        assert_eq!(cfg.session_info_key(), Some("cas_user"));
    }

    #[test]
    fn service_for_joins_paths() {
        let cfg = GatewayConfig::from_options(opts()).unwrap();
        assert_eq!(cfg.service_for("/secure"), "https://app.example.org/secure");
        assert_eq!(cfg.service_for("secure"), "https://app.example.org/secure");
    }

    #[test]
    fn parses_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casgate.json");
        std::fs::write(&path, r#"{"cas_url":"https://cas.example.org/cas","service_url":"http://localhost:3000","cas_version":"1.0","renew":true,"dev_mode_info":{"role":["admin"]}}"#).unwrap();
        let o = GatewayOptions::from_json_file(&path).unwrap();
        assert_eq!(o.cas_version, "1.0");
        assert!(o.renew);
        assert_eq!(o.session_name, "cas_user");
        assert_eq!(o.dev_mode_info.get("role"), Some(&vec!["admin".to_string()]));
        assert!(GatewayOptions::from_json_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
