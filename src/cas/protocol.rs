//! CAS protocol variants: which validation endpoint each version uses and how its
//! response body maps to a [`ValidationOutcome`]. Pure functions, no I/O.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::CasError;
use crate::identity::CasPrincipal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V1,
    V2,
    V3,
}

impl ProtocolVersion {
    pub fn validation_path(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "/validate",
            ProtocolVersion::V2 => "/serviceValidate",
            ProtocolVersion::V3 => "/p3/serviceValidate",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "1.0",
            ProtocolVersion::V2 => "2.0",
            ProtocolVersion::V3 => "3.0",
        }
    }

    /// Parse a validation response body. Never fails: every malformed body is a `Failure`.
    pub fn parse(&self, body: &str) -> ValidationOutcome {
        match self {
            ProtocolVersion::V1 => parse_plain_text(body),
            ProtocolVersion::V2 | ProtocolVersion::V3 => parse_service_response(body),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = CasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.0" | "1" => Ok(ProtocolVersion::V1),
            "2.0" | "2" => Ok(ProtocolVersion::V2),
            "3.0" | "3" => Ok(ProtocolVersion::V3),
            other => Err(CasError::config(format!(
                "unsupported CAS protocol version '{}' (expected 1.0, 2.0 or 3.0)",
                other
            ))),
        }
    }
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Result of exactly one ticket validation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Success(CasPrincipal),
    Failure(CasError),
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool { matches!(self, ValidationOutcome::Success(_)) }

    pub fn user(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Success(p) => Some(p.user.as_str()),
            ValidationOutcome::Failure(_) => None,
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            ValidationOutcome::Success(_) => None,
            ValidationOutcome::Failure(e) => Some(e.to_string()),
        }
    }
}

/// CAS 1.0: `yes\n<user>\n` or `no\n`.
fn parse_plain_text(body: &str) -> ValidationOutcome {
    let lines: Vec<&str> = body.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect();
    match lines[0] {
        "yes" => match lines.get(1) {
            Some(user) if !user.is_empty() => ValidationOutcome::Success(CasPrincipal::new(*user)),
            _ => ValidationOutcome::Failure(CasError::protocol("missing user line")),
        },
        "no" => ValidationOutcome::Failure(CasError::denied()),
        other => ValidationOutcome::Failure(CasError::protocol(format!(
            "unexpected first line '{}'",
            truncate(other, 64)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shape of a CAS 2.0/3.0 `serviceResponse` after tag normalisation. Built by
/// [`read_service_response`], then checked by [`ServiceResponse::into_outcome`].
#[derive(Debug, Default)]
struct ServiceResponse {
    failure: Option<FailureBody>,
    success: Option<SuccessBody>,
}

#[derive(Debug, Default)]
struct FailureBody {
    code: Option<String>,
    detail: String,
}

#[derive(Debug, Default)]
struct SuccessBody {
    user: Option<String>,
    attributes: BTreeMap<String, Vec<String>>,
}

impl ServiceResponse {
    fn into_outcome(self) -> ValidationOutcome {
        if let Some(f) = self.failure {
            return ValidationOutcome::Failure(CasError::Rejected { code: f.code, detail: f.detail });
        }
        let Some(s) = self.success else {
            return ValidationOutcome::Failure(CasError::protocol("neither authenticationSuccess nor authenticationFailure present"));
        };
        match s.user {
            Some(user) if !user.is_empty() => ValidationOutcome::Success(CasPrincipal { user, attributes: s.attributes }),
            _ => ValidationOutcome::Failure(CasError::protocol("authenticationSuccess without user")),
        }
    }
}

fn parse_service_response(body: &str) -> ValidationOutcome {
    match read_service_response(body) {
        Ok(resp) => resp.into_outcome(),
        Err(e) => ValidationOutcome::Failure(e),
    }
}

/// Lowercased local name, so `cas:authenticationSuccess` and `AUTHENTICATIONSUCCESS` match.
fn normalize_tag(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn failure_from_attrs(e: &BytesStart<'_>) -> FailureBody {
    let mut fb = FailureBody::default();
    for attr in e.attributes().flatten() {
        if normalize_tag(attr.key.local_name().as_ref()) == "code" {
            fb.code = attr.unescape_value().ok().map(|v| v.trim().to_string());
        }
    }
    fb
}

fn read_service_response(xml: &str) -> Result<ServiceResponse, CasError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = ServiceResponse::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = normalize_tag(e.local_name().as_ref());
                if stack.is_empty() {
                    if saw_root || name != "serviceresponse" {
                        return Err(CasError::protocol(format!("unexpected root element '{}'", name)));
                    }
                    saw_root = true;
                }
                if name == "authenticationfailure" && stack.len() == 1 {
                    out.failure = Some(failure_from_attrs(&e));
                }
                if name == "authenticationsuccess" && stack.len() == 1 {
                    out.success = Some(SuccessBody::default());
                }
                stack.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = normalize_tag(e.local_name().as_ref());
                if stack.is_empty() {
                    return Err(CasError::protocol(format!("unexpected root element '{}'", name)));
                }
                if name == "authenticationfailure" && stack.len() == 1 {
                    out.failure = Some(failure_from_attrs(&e));
                }
            }
            Ok(Event::Text(e)) => {
                let t = e.unescape().map_err(|err| CasError::protocol(format!("bad text: {}", err)))?;
                text.push_str(&t);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    return Err(CasError::protocol("unbalanced end tag"));
                };
                let value = std::mem::take(&mut text).trim().to_string();
                let parents: Vec<&str> = stack.iter().map(|s| s.as_str()).collect();
                match (parents.as_slice(), name.as_str()) {
                    ([_], "authenticationfailure") => {
                        if let Some(fb) = out.failure.as_mut() { fb.detail = value; }
                    }
                    ([_, "authenticationsuccess"], "user") => {
                        if let Some(sb) = out.success.as_mut() { sb.user = Some(value); }
                    }
                    ([_, "authenticationsuccess", "attributes"], attr) => {
                        if let Some(sb) = out.success.as_mut() {
                            sb.attributes.entry(attr.to_string()).or_default().push(value);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CasError::protocol(format!("XML parse error: {}", e))),
            _ => {}
        }
    }

    if !saw_root {
        return Err(CasError::protocol("empty document"));
    }
    if !stack.is_empty() {
        return Err(CasError::protocol("unexpected end of document"));
    }
    Ok(out)
}
