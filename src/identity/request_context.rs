/// What the gateway needs to know about an inbound request.
#[derive(Debug, Clone, Default)]
pub struct GatewayRequest {
    /// Request path without the query string, e.g. `/secure/page`.
    pub path: String,
    /// Decoded query parameters in arrival order.
    pub query: Vec<(String, String)>,
    /// Raw query string, kept so the return-to path can be reproduced exactly.
    pub raw_query: Option<String>,
}

impl GatewayRequest {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self { path: path.into(), query: Vec::new(), raw_query: None }
    }

    /// Build from a path and an undecoded query string (`a=1&b=x%20y`).
    pub fn from_parts(path: &str, raw_query: Option<&str>) -> Self {
        let path = if path.is_empty() { "/".to_string() } else { path.to_string() };
        let raw_query = raw_query.filter(|q| !q.is_empty()).map(|q| q.to_string());
        let query = raw_query.as_deref().map(parse_query).unwrap_or_default();
        Self { path, query, raw_query }
    }

    /// First non-empty value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, v)| k == name && !v.is_empty()).map(|(_, v)| v.as_str())
    }

    pub fn ticket(&self) -> Option<&str> { self.query_param("ticket") }

    /// Explicit `returnTo`, only when it names a path on this application.
    pub fn return_to(&self) -> Option<&str> { self.query_param("returnTo").filter(|t| is_local_path(t)) }

    pub fn path_and_query(&self) -> String {
        match &self.raw_query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}

fn parse_query(q: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(q.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Same-origin path: starts with a single `/`, no scheme or authority, no backslashes.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(|c| c.is_control())
}

/// What the caller must do with the request once the gateway has decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    /// Hand the request on to the protected handler.
    Continue,
    /// Send the client to this absolute or path-relative URL.
    Redirect(String),
    /// Answer immediately with this status code.
    Status(u16),
}

impl GatewayResponse {
    pub fn unauthorized() -> Self { GatewayResponse::Status(401) }
}
