//! CAS protocol client side: response grammars per protocol version, the outbound
//! ticket validation call, and login/logout URL construction.

mod protocol;
mod redirect;
mod validator;

pub use protocol::{ProtocolVersion, ValidationOutcome};
pub use redirect::RedirectBuilder;
pub use validator::{HttpTicketValidator, TicketValidator};
