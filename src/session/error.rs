use std::{
    error::Error,
    fmt::{self, Display},
};

/// The operation category a [`SessionError`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Open,
    Close,
    Read,
    Write,
    Delete,
    Request,
}

#[derive(Debug)]
pub enum SessionError {
    Open(OpenError),
    Close(CloseError),
    Read(AccessError),
    Write(AccessError),
    Delete(AccessError),
    /// No session has been attached to the request.
    MissingFromRequest,
    /// The request already has a session attached.
    AlreadyAttached,
    /// The backend rejected the request it was handed.
    Attach(anyhow::Error),
}

#[derive(Debug)]
pub enum OpenError {
    AlreadyOpen,
    Closed,
    Backend(anyhow::Error),
}

#[derive(Debug)]
pub enum CloseError {
    AlreadyClosed,
    NeverOpened,
    Backend(anyhow::Error),
}

/// Why a read, write or delete failed.
#[derive(Debug)]
pub enum AccessError {
    Closed,
    EmptyKey,
    Backend(anyhow::Error),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Open(_) => ErrorKind::Open,
            SessionError::Close(_) => ErrorKind::Close,
            SessionError::Read(_) => ErrorKind::Read,
            SessionError::Write(_) => ErrorKind::Write,
            SessionError::Delete(_) => ErrorKind::Delete,
            SessionError::MissingFromRequest
            | SessionError::AlreadyAttached
            | SessionError::Attach(_) => ErrorKind::Request,
        }
    }

    /// The error reported by the storage backend, if the failure came from it.
    pub fn backend(&self) -> Option<&anyhow::Error> {
        match self {
            SessionError::Open(OpenError::Backend(e))
            | SessionError::Close(CloseError::Backend(e))
            | SessionError::Read(AccessError::Backend(e))
            | SessionError::Write(AccessError::Backend(e))
            | SessionError::Delete(AccessError::Backend(e))
            | SessionError::Attach(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Open(OpenError::AlreadyOpen) => f.write_str(
                "failed to open the user session as it is already open, open() should only be called once",
            ),
            SessionError::Open(OpenError::Closed) => f.write_str(
                "failed to re-open the user session, it is already closed and locked from further changes",
            ),
            SessionError::Open(OpenError::Backend(e)) => {
                write!(f, "failed to open the user session due to unexpected error: {e}")
            }
            SessionError::Close(CloseError::AlreadyClosed) => f.write_str(
                "failed to close the user session as it is already closed, close() should only be called once",
            ),
            SessionError::Close(CloseError::NeverOpened) => f.write_str(
                "failed to close the user session as it was never opened",
            ),
            SessionError::Close(CloseError::Backend(e)) => {
                write!(f, "failed to close the user session due to unexpected error: {e}")
            }
            SessionError::Read(e) => write!(f, "failed to read data from the user session {e}"),
            SessionError::Write(e) => write!(f, "failed to write data to the user session {e}"),
            SessionError::Delete(e) => {
                write!(f, "failed to remove data from the user session {e}")
            }
            SessionError::MissingFromRequest => f.write_str(
                "could not get the session for this request as one has yet to be assigned to it",
            ),
            SessionError::AlreadyAttached => f.write_str(
                "could not assign a new session to this request as it already has an open session assigned to it",
            ),
            SessionError::Attach(e) => {
                write!(f, "could not attach the request to the user session: {e}")
            }
        }
    }
}

impl Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::Closed => f.write_str("as it is already closed"),
            AccessError::EmptyKey => f.write_str("as the key is empty"),
            AccessError::Backend(e) => write!(f, "due to an unexpected error: {e}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.backend().map(|e| {
            let source: &(dyn Error + 'static) = e.as_ref();
            source
        })
    }
}
