use serde_json::Value;

use crate::{StorageResult, request::Request};

/// A backend capable of storing user session data.
///
/// [`SessionHandler`](crate::SessionHandler) guarantees `open` is never called
/// twice without a `close` in between and that `persist` runs right before
/// `close`. `has` and `read` may be called before the session is opened,
/// `write`, `remove` and `clear` only while it is open.
pub trait SessionStorage: Send + 'static {
    fn open(&mut self) -> StorageResult<()>;

    fn close(&mut self) -> StorageResult<()>;

    /// The name of the cookie carrying the session id. Never empty.
    fn name(&self) -> &str;

    fn has(&self, key: &str) -> StorageResult<bool>;

    fn read(&self, key: &str) -> StorageResult<Option<Value>>;

    fn write(&mut self, key: &str, value: Value) -> StorageResult<()>;

    fn remove(&mut self, key: &str) -> StorageResult<()>;

    fn clear(&mut self) -> StorageResult<()>;

    /// Flush pending writes to durable storage.
    fn persist(&mut self) -> StorageResult<()>;

    /// Erase all session data and any client visible trace of the session.
    fn destroy(&mut self) -> StorageResult<()>;

    /// Backends that need the current request implement [`RequestAware`] and
    /// return themselves here.
    fn as_request_aware(&mut self) -> Option<&mut dyn RequestAware> {
        None
    }
}

pub trait RequestAware {
    fn set_request(&mut self, request: &Request) -> StorageResult<()>;
}
