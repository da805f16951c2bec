mod error;
mod handler;
mod id;
mod storage;

pub mod native;

pub use error::{AccessError, CloseError, ErrorKind, OpenError, SessionError};
pub use handler::{SessionHandler, SessionState};
pub use id::SessionId;
pub use native::{NativeSession, NativeSessionBuilder};
pub use storage::{RequestAware, SessionStorage};
