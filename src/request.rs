use std::{collections::HashMap, env};

use http::{HeaderMap, HeaderName, HeaderValue, header::HOST, request::Parts};
use url::Url;

pub use http::Method;

use crate::{
    cookie::Cookies,
    error::{EnvironmentError, Error, HeaderError, UrlParseError},
    session::{SessionError, SessionHandler},
};

const ALLOWED_METHODS: [Method; 7] = [
    Method::OPTIONS,
    Method::HEAD,
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Url encoded key value pairs, from a query string or form body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    pub fn parse(input: &str) -> Self {
        Parameters(
            url::form_urlencoded::parse(input.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    /// The first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(key, _)| key == name)
    }

    pub fn all(&self) -> &[(String, String)] {
        &self.0
    }
}

/// An HTTP request received by the server.
///
/// A request owns at most one [`SessionHandler`]. Storage that implements
/// [`RequestAware`](crate::RequestAware) gets a handle on the request's
/// cookies when the handler is attached.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    cookies: Cookies,
    query: Parameters,
    post: Parameters,
    session: Option<SessionHandler>,
}

impl Request {
    fn new(method: Method, url: Url, headers: HeaderMap) -> Self {
        let method = if ALLOWED_METHODS.contains(&method) {
            method
        } else {
            Method::GET
        };

        let cookies = Cookies::from_headers(&headers);
        let query = url.query().map(Parameters::parse).unwrap_or_default();

        Self {
            method,
            url,
            headers,
            cookies,
            query,
            post: Parameters::default(),
            session: None,
        }
    }

    /// Build a request from its parts. Unknown methods fall back to `GET`.
    pub fn create(method: &str, url: &str, headers: &[(&str, &str)]) -> Result<Self, Error> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .unwrap_or(Method::GET);
        let url = Url::parse(url).map_err(|e| UrlParseError::new(url, e))?;

        let mut map = HeaderMap::new();
        for &(name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HeaderError::InvalidName(name.to_owned()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| HeaderError::InvalidValue(name.to_owned()))?;
            map.append(header_name, header_value);
        }

        Ok(Self::new(method, url, map))
    }

    /// Build a request from the parts of an [`http::Request`]. Relative uris
    /// are resolved against the `Host` header.
    pub fn from_parts(parts: &Parts) -> Result<Self, Error> {
        let url = if parts.uri.scheme().is_some() {
            let uri = parts.uri.to_string();
            Url::parse(&uri).map_err(|e| UrlParseError::new(uri, e))?
        } else {
            let host = parts
                .headers
                .get(HOST)
                .and_then(|host| host.to_str().ok())
                .ok_or_else(|| EnvironmentError::new("the request has no host"))?;

            let path = parts
                .uri
                .path_and_query()
                .map_or("/", |path| path.as_str());

            let uri = format!("http://{host}{path}");
            Url::parse(&uri).map_err(|e| UrlParseError::new(uri, e))?
        };

        Ok(Self::new(parts.method.clone(), url, parts.headers.clone()))
    }

    /// Build a request from CGI style process environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, Error> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let var = |name: &str| vars.get(name).cloned();

        let method = var("REQUEST_METHOD")
            .ok_or_else(|| EnvironmentError::new("required REQUEST_METHOD value missing"))?;
        let host = var("HTTP_HOST")
            .or_else(|| var("SERVER_NAME"))
            .ok_or_else(|| EnvironmentError::new("required HTTP_HOST value missing"))?;

        let scheme = match var("HTTPS").as_deref() {
            Some("") | Some("off") | None => "http",
            Some(_) => "https",
        };

        let path = var("REQUEST_URI").unwrap_or_else(|| {
            let path = var("PATH_INFO").unwrap_or_else(|| "/".into());
            match var("QUERY_STRING") {
                Some(query) if !query.is_empty() => format!("{path}?{query}"),
                _ => path,
            }
        });

        let headers: Vec<(String, &str)> = vars
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix("HTTP_")?;
                Some((name.replace('_', "-").to_ascii_lowercase(), value.as_str()))
            })
            .collect();
        let headers: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();

        let url = format!("{scheme}://{host}{path}");
        Self::create(&method, &url, &headers)
    }

    /// Attach the form encoded body of this request.
    pub fn with_form(mut self, body: &str) -> Self {
        self.post = Parameters::parse(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn protocol(&self) -> &str {
        self.url.scheme()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn query(&self) -> &Parameters {
        &self.query
    }

    pub fn post(&self) -> &Parameters {
        &self.post
    }

    /// Attach the session for this request. A request only ever gets one.
    pub fn attach_session(&mut self, mut handler: SessionHandler) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyAttached);
        }

        handler.attach(self)?;
        self.session = Some(handler);
        Ok(())
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&SessionHandler, SessionError> {
        self.session.as_ref().ok_or(SessionError::MissingFromRequest)
    }

    pub fn session_mut(&mut self) -> Result<&mut SessionHandler, SessionError> {
        self.session.as_mut().ok_or(SessionError::MissingFromRequest)
    }
}

#[cfg(feature = "axum")]
mod extract {
    use axum::{
        extract::FromRequestParts,
        http::{StatusCode, request::Parts},
    };

    use crate::request::Request;

    impl<S> FromRequestParts<S> for Request
    where
        S: Send + Sync,
    {
        type Rejection = StatusCode;

        async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, StatusCode> {
            Request::from_parts(parts).map_err(|e| {
                tracing::debug!("could not build request: {e}");
                StatusCode::BAD_REQUEST
            })
        }
    }
}
