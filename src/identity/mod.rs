//! Identity and session handling for the CAS gateway.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod request_context;
mod authorizer;

pub use principal::{CasPrincipal, Attrs};
pub use session::{gen_id, IdSource, Session, MemorySession, SessionStore, StoredSession};
pub use request_context::{GatewayRequest, GatewayResponse};
pub use authorizer::{AuthMode, CasGateway, RETURN_TO_KEY};
