//! Broker management API adapter.
//!
//! Implements `BrokerAdapter` over the broker's HTTP management API with a
//! blocking `reqwest` client: one request per call, HTTP basic auth, a
//! per-request timeout, no retries.
//!
//! Built-in exchanges (the default exchange and `amq.*`) are never listed;
//! no client may delete them.

mod paths;
mod wire;

use std::fmt;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, Url};
use thiserror::Error;
use tpk_config::BrokerConnection;
use tpk_schemas::{BrokerAdapter, BrokerError, BrokerOp, Entity, EntityKind, ObservedEntity};
use tracing::debug;

pub use paths::{collection, create_segments, delete_segments, endpoint};
pub use wire::{create_body, decode_listing, is_builtin_exchange, WireError};

#[derive(Debug, Error)]
pub enum HttpBrokerError {
    #[error("invalid broker url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct HttpBroker {
    client: Client,
    base: Url,
    username: String,
    password: String,
}

impl fmt::Debug for HttpBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBroker")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl HttpBroker {
    pub fn new(conn: &BrokerConnection) -> Result<Self, HttpBrokerError> {
        let base = Url::parse(&conn.base_url).map_err(|e| HttpBrokerError::InvalidUrl {
            url: conn.base_url.clone(),
            message: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(HttpBrokerError::InvalidUrl {
                url: conn.base_url.clone(),
                message: "url cannot carry a path".to_string(),
            });
        }

        let client = Client::builder().timeout(conn.timeout).build()?;

        Ok(Self {
            client,
            base,
            username: conn.username.clone(),
            password: conn.password.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(
        &self,
        op: BrokerOp,
        kind: EntityKind,
        target: &str,
        segments: &[&str],
    ) -> Result<Url, BrokerError> {
        endpoint(&self.base, segments).ok_or_else(|| BrokerError::Transport {
            op,
            kind,
            target: target.to_string(),
            message: format!("cannot build a request path under '{}'", self.base),
        })
    }

    /// Send `request`; any non-2xx status is a `BrokerError::Request`.
    fn send(
        &self,
        op: BrokerOp,
        kind: EntityKind,
        target: &str,
        request: RequestBuilder,
    ) -> Result<String, BrokerError> {
        let transport = |e: reqwest::Error| BrokerError::Transport {
            op,
            kind,
            target: target.to_string(),
            message: if e.is_timeout() {
                format!("timed out: {e}")
            } else {
                e.to_string()
            },
        };

        let resp = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(transport)?;
        let status = resp.status();
        let body = resp.text().map_err(transport)?;

        if !status.is_success() {
            return Err(BrokerError::Request {
                op,
                kind,
                target: target.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl BrokerAdapter for HttpBroker {
    fn list(&self, kind: EntityKind) -> Result<Vec<ObservedEntity>, BrokerError> {
        let op = BrokerOp::List;
        let target = collection(kind);
        let url = self.url(op, kind, target, &[target])?;
        let body = self.send(op, kind, target, self.client.get(url))?;

        let listed = decode_listing(kind, &body).map_err(|e| BrokerError::Decode {
            kind,
            message: e.to_string(),
        })?;
        debug!(%kind, count = listed.len(), "listed");
        Ok(listed)
    }

    fn create(&self, entity: &Entity) -> Result<(), BrokerError> {
        let op = BrokerOp::Create;
        let kind = entity.kind();
        let target = entity.label();
        let url = self.url(op, kind, &target, &create_segments(entity))?;
        let method = match entity {
            Entity::Binding(_) => Method::POST,
            _ => Method::PUT,
        };
        let request = self.client.request(method, url).json(&create_body(entity));
        self.send(op, kind, &target, request)?;
        Ok(())
    }

    fn delete(&self, entity: &Entity) -> Result<(), BrokerError> {
        let op = BrokerOp::Delete;
        let kind = entity.kind();
        let target = entity.label();
        let url = self.url(op, kind, &target, &delete_segments(entity))?;
        self.send(op, kind, &target, self.client.delete(url))?;
        Ok(())
    }
}
