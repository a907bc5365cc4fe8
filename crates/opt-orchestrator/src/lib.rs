pub mod channel;
pub mod error;
pub mod registry;
pub mod rest;
pub mod session;

pub use channel::{ChannelEvent, SessionChannel};
pub use error::SessionError;
pub use registry::{generate_session_id, SessionRecord, SessionRegistry};
pub use rest::RestOptimiser;
pub use session::{progress, Session, SessionState};
