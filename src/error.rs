//! Gateway error model.
//! One enum covers every failure the gateway can meet, from startup configuration to
//! logout. None of these reach the end user raw: the authorizer resolves each of them
//! into either an unauthorized status or a redirect and logs the detail.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CasError {
    /// Unsupported protocol version or an unusable CAS/service URL. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The CAS server could not be reached or the response could not be read.
    #[error("request/response error: {0}")]
    Transport(String),
    /// The validation body did not match the expected grammar or schema.
    #[error("authentication failed: malformed validation response ({0})")]
    Protocol(String),
    /// The CAS server explicitly denied the ticket.
    #[error("{}", rejection_message(.code.as_deref(), .detail))]
    Rejected { code: Option<String>, detail: String },
    /// Destroying the whole session on logout failed.
    #[error("session destruction failed: {0}")]
    SessionDestruction(String),
    /// A new session could not be allocated (no secure session id available).
    #[error("session allocation failed: {0}")]
    SessionAllocation(String),
}

fn rejection_message(code: Option<&str>, detail: &str) -> String {
    let mut out = String::from("authentication failed");
    if let Some(c) = code.filter(|c| !c.is_empty()) {
        out.push_str(": ");
        out.push_str(c);
    }
    if !detail.is_empty() {
        out.push_str(if code.map(|c| c.is_empty()).unwrap_or(true) { ": " } else { " " });
        out.push_str(detail);
    }
    out
}

impl CasError {
    pub fn config<S: Into<String>>(msg: S) -> Self { CasError::Configuration(msg.into()) }
    pub fn transport<S: Into<String>>(msg: S) -> Self { CasError::Transport(msg.into()) }
    pub fn protocol<S: Into<String>>(msg: S) -> Self { CasError::Protocol(msg.into()) }

    /// A bare denial with neither code nor detail, as CAS 1.0 reports it.
    pub fn denied() -> Self { CasError::Rejected { code: None, detail: String::new() } }

    pub fn code_str(&self) -> &'static str {
        match self {
            CasError::Configuration(_) => "configuration_error",
            CasError::Transport(_) => "transport_error",
            CasError::Protocol(_) => "protocol_error",
            CasError::Rejected { .. } => "authentication_failed",
            CasError::SessionDestruction(_) => "session_destruction_failed",
            CasError::SessionAllocation(_) => "session_allocation_failed",
        }
    }

    /// Map to the HTTP status the gateway answers with when this error ends a request.
    pub fn http_status(&self) -> u16 {
        match self {
            CasError::Transport(_) | CasError::Protocol(_) | CasError::Rejected { .. } => 401,
            CasError::Configuration(_) | CasError::SessionDestruction(_) | CasError::SessionAllocation(_) => 500,
        }
    }

    /// Server-provided failure code, if the CAS server sent one (2.0/3.0 only).
    pub fn cas_code(&self) -> Option<&str> {
        match self {
            CasError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub type CasResult<T> = Result<T, CasError>;
