pub type StorageResult<O, E = anyhow::Error> = ::std::result::Result<O, E>;

pub mod cookie;
pub mod error;
pub mod request;
pub mod session;

pub(crate) mod utils;

pub use cookie::{Cookie, Cookies, SameSite};
pub use error::{EnvironmentError, Error, HeaderError, UrlParseError};
pub use request::{Method, Parameters, Request};
pub use session::{
    ErrorKind, NativeSession, RequestAware, SessionError, SessionHandler, SessionId,
    SessionState, SessionStorage,
};
