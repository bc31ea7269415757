use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use tracing::error;

use crate::error::{CasError, CasResult};
use crate::tprintln;

/// Per-client key/value session as the gateway sees it. The gateway only touches the
/// identity key, the attribute key and the pending return-to key.
pub trait Session: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn insert(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str) -> Option<String>;
    /// Drop the whole session. Callers log failures and carry on.
    fn destroy(&mut self) -> Result<(), CasError>;
}

/// Plain map-backed session, for embedding callers that manage storage themselves.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    pub values: HashMap<String, String>,
    pub destroyed: bool,
}

impl MemorySession {
    pub fn new() -> Self { Self::default() }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<String> { self.values.get(key).cloned() }
    fn insert(&mut self, key: &str, value: String) { self.values.insert(key.to_string(), value); }
    fn remove(&mut self, key: &str) -> Option<String> { self.values.remove(key) }
    fn destroy(&mut self) -> Result<(), CasError> {
        self.values.clear();
        self.destroyed = true;
        Ok(())
    }
}

#[derive(Debug)]
struct SessionEntry {
    values: HashMap<String, String>,
    expires_at: Instant,
}

/// 256-bit random id, base64url without padding. Fails rather than fall back to a
/// predictable id when the OS random source is unavailable.
pub fn gen_id() -> CasResult<String> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf)
        .map_err(|e| CasError::SessionAllocation(format!("random source unavailable: {}", e)))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Source of fresh session ids.
pub type IdSource = fn() -> CasResult<String>;

/// Cookie-addressed in-memory session registry with a sliding TTL.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, SessionEntry>>>,
    pub ttl: Duration,
    id_source: IdSource,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self { Self::with_id_source(ttl, gen_id) }

    pub fn with_id_source(ttl: Duration, id_source: IdSource) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), ttl, id_source }
    }

    /// Bind a handle to `sid` if it names a live session; otherwise the handle starts
    /// empty and only allocates an id on first write.
    pub fn open(&self, sid: Option<&str>) -> StoredSession {
        let live = sid.filter(|s| self.is_live(s)).map(|s| s.to_string());
        StoredSession { store: self.clone(), sid: live, issued: false, destroyed: false, failure: None }
    }

    fn is_live(&self, sid: &str) -> bool {
        let now = Instant::now();
        let expired = match self.entries.read().get(sid) {
            Some(ent) => ent.expires_at <= now,
            None => return false,
        };
        if expired {
            self.entries.write().remove(sid);
            return false;
        }
        true
    }

    /// Remove expired sessions; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut map = self.entries.write();
        let before = map.len();
        map.retain(|_, ent| ent.expires_at > now);
        before - map.len()
    }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }

    pub fn value(&self, sid: &str, key: &str) -> Option<String> {
        self.entries.read().get(sid).and_then(|ent| ent.values.get(key).cloned())
    }
}

/// Request-scoped handle onto one [`SessionStore`] entry. Each call takes the store
/// lock briefly, so no guard is held across the validation await.
pub struct StoredSession {
    store: SessionStore,
    sid: Option<String>,
    issued: bool,
    destroyed: bool,
    failure: Option<CasError>,
}

impl StoredSession {
    pub fn sid(&self) -> Option<&str> { self.sid.as_deref() }

    /// True when this request created the session and the client needs its cookie.
    pub fn issued(&self) -> bool { self.issued && !self.destroyed }

    pub fn destroyed(&self) -> bool { self.destroyed }

    /// Set when a write needed a new session and none could be allocated; the write was dropped.
    pub fn failure(&self) -> Option<&CasError> { self.failure.as_ref() }

    fn touch(&self, ent: &mut SessionEntry) { ent.expires_at = Instant::now() + self.store.ttl; }
}

impl Session for StoredSession {
    fn get(&self, key: &str) -> Option<String> {
        let sid = self.sid.as_ref()?;
        let map = self.store.entries.read();
        let ent = map.get(sid)?;
        if ent.expires_at <= Instant::now() { return None; }
        ent.values.get(key).cloned()
    }

    fn insert(&mut self, key: &str, value: String) {
        let sid = match &self.sid {
            Some(s) => s.clone(),
            None => {
                let s = match (self.store.id_source)() {
                    Ok(s) => s,
                    Err(e) => {
                        error!(target: "casgate::session", "refusing to allocate session: {}", e);
                        self.failure = Some(e);
                        return;
                    }
                };
                self.sid = Some(s.clone());
                self.issued = true;
                self.destroyed = false;
                tprintln!("session.issue sid={} ttl_secs={}", s, self.store.ttl.as_secs());
                s
            }
        };
        let mut map = self.store.entries.write();
        let ent = map.entry(sid).or_insert_with(|| SessionEntry {
            values: HashMap::new(),
            expires_at: Instant::now() + self.store.ttl,
        });
        ent.values.insert(key.to_string(), value);
        self.touch(ent);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let sid = self.sid.as_ref()?;
        let mut map = self.store.entries.write();
        map.get_mut(sid).and_then(|ent| ent.values.remove(key))
    }

    fn destroy(&mut self) -> Result<(), CasError> {
        if let Some(sid) = self.sid.take() {
            let removed = self.store.entries.write().remove(&sid).is_some();
            tprintln!("session.destroy sid={} removed={}", sid, removed);
        }
        self.destroyed = true;
        Ok(())
    }
}
