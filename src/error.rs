use std::{
    error::Error as StdError,
    fmt::{self, Display},
};

use crate::session::SessionError;

/// Required ambient configuration (process environment) is missing.
#[derive(Debug)]
pub struct EnvironmentError {
    reason: String,
}

impl EnvironmentError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for EnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed due to a problem with the environment: {}",
            self.reason
        )
    }
}

impl StdError for EnvironmentError {}

#[derive(Debug)]
pub struct UrlParseError {
    subject: String,
    source: url::ParseError,
}

impl UrlParseError {
    pub fn new(subject: impl Into<String>, source: url::ParseError) -> Self {
        Self {
            subject: subject.into(),
            source,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Display for UrlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse '{}' as a url: {}",
            self.subject, self.source
        )
    }
}

impl StdError for UrlParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug)]
pub enum HeaderError {
    InvalidName(String),
    InvalidValue(String),
}

impl Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::InvalidName(name) => write!(f, "'{name}' is not a valid header name"),
            HeaderError::InvalidValue(name) => {
                write!(f, "value of header '{name}' contains invalid bytes")
            }
        }
    }
}

impl StdError for HeaderError {}

#[derive(Debug)]
pub enum Error {
    Environment(EnvironmentError),
    UrlParse(UrlParseError),
    Header(HeaderError),
    Session(SessionError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Environment(e) => e.fmt(f),
            Error::UrlParse(e) => e.fmt(f),
            Error::Header(e) => e.fmt(f),
            Error::Session(e) => e.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Environment(e) => Some(e),
            Error::UrlParse(e) => Some(e),
            Error::Header(e) => Some(e),
            Error::Session(e) => Some(e),
        }
    }
}

impl From<EnvironmentError> for Error {
    fn from(value: EnvironmentError) -> Self {
        Error::Environment(value)
    }
}

impl From<UrlParseError> for Error {
    fn from(value: UrlParseError) -> Self {
        Error::UrlParse(value)
    }
}

impl From<HeaderError> for Error {
    fn from(value: HeaderError) -> Self {
        Error::Header(value)
    }
}

impl From<SessionError> for Error {
    fn from(value: SessionError) -> Self {
        Error::Session(value)
    }
}

#[cfg(test)]
mod crate_error {
    use std::error::Error as _;

    use crate::{EnvironmentError, Error, HeaderError, SessionError};

    #[test]
    fn messages() {
        let err = EnvironmentError::new("REQUEST_METHOD is not set");
        assert_eq!(
            err.to_string(),
            "failed due to a problem with the environment: REQUEST_METHOD is not set"
        );

        let err = HeaderError::InvalidName("bad header".into());
        assert_eq!(err.to_string(), "'bad header' is not a valid header name");
    }

    #[test]
    fn wraps_with_source() {
        let err: Error = SessionError::MissingFromRequest.into();
        assert!(matches!(err, Error::Session(SessionError::MissingFromRequest)));
        assert!(err.source().is_some());

        let parse = url::Url::parse("not a url").unwrap_err();
        let err: Error = crate::UrlParseError::new("not a url", parse).into();
        assert!(err.to_string().starts_with("failed to parse 'not a url'"));
        assert!(err.source().and_then(|e| e.source()).is_some());
    }
}
