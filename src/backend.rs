use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

/// Transport to the account/contact backend. Every response uses the
/// `{success, message, data, error}` envelope.
pub trait Backend {
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Envelope<Value>>;
}

impl<T: Backend + ?Sized> Backend for &T {
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Envelope<Value>> {
        (**self).send(method, path, body, token)
    }
}

/// Pulls `data` out of a successful envelope.
pub fn into_data<T: DeserializeOwned>(envelope: Envelope<Value>) -> Result<T> {
    if !envelope.success {
        return Err(Error::Validation(failure_message(&envelope)));
    }
    let data = envelope
        .data
        .ok_or_else(|| Error::Transport("malformed response: missing data".to_string()))?;
    Ok(serde_json::from_value(data)?)
}

fn failure_message(envelope: &Envelope<Value>) -> String {
    envelope
        .message
        .clone()
        .or_else(|| envelope.error.clone())
        .unwrap_or_else(|| "request failed".to_string())
}

fn classify(status: u16, message: String) -> Error {
    match status {
        400 | 422 => Error::Validation(message),
        401 | 403 => Error::Auth(message),
        404 => Error::NotFound(message),
        409 => Error::Duplicate(message),
        _ => Error::Status(status),
    }
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

impl Backend for HttpBackend {
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Envelope<Value>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, authenticated = token.is_some(), "backend request");

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        let envelope: Option<Envelope<Value>> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            return Err(match envelope {
                Some(env) => classify(status.as_u16(), failure_message(&env)),
                None => Error::Status(status.as_u16()),
            });
        }
        envelope.ok_or_else(|| Error::Transport("malformed response from backend".to_string()))
    }
}
