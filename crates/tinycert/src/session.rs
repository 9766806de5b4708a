//! Authenticated session and the signed call primitive
//!
//! Every request goes through the same path: the caller's fields plus the
//! session token are canonicalized, signed with the API key, POSTed as a form,
//! and the JSON reply is decoded into the type the caller asks for.

use scopeguard::ScopeGuard;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, TinyCertError};
use crate::fields::{encode, Fields};
use crate::signer::sign;
use crate::transport::{HttpTransport, RawResponse, Transport};

/// Name of the field carrying the session token
pub const TOKEN_FIELD: &str = "token";

/// Name of the trailing signature field
pub const DIGEST_FIELD: &str = "digest";

/// Authentication state of a [`Session`]
#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected { token: String },
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unconnected => f.write_str("Unconnected"),
            SessionState::Connected { .. } => f
                .debug_struct("Connected")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// A canonicalized, signed request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Sorted, encoded fields the digest was computed over
    pub canonical: String,
    /// Lowercase hex HMAC-SHA256 of `canonical`
    pub digest: String,
}

impl SignedRequest {
    /// Form body as transmitted: the canonical fields followed by the digest
    pub fn body(&self) -> String {
        format!(
            "{}&{}={}",
            self.canonical,
            DIGEST_FIELD,
            encode(&self.digest)
        )
    }
}

#[derive(Deserialize)]
struct ConnectResponse {
    token: String,
}

/// Client session holding credentials and, once connected, the token
///
/// `connect` must precede every resource operation. Resource operations
/// borrow the session immutably, so one session can serve several resources,
/// but `connect`/`disconnect` need exclusive access.
pub struct Session<T: Transport = HttpTransport> {
    config: SessionConfig,
    transport: T,
    state: SessionState,
}

impl Session<HttpTransport> {
    /// Create a session that talks HTTP with the configured timeout
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Session<T> {
    pub fn with_transport(config: SessionConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: SessionState::Unconnected,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    fn token(&self) -> Option<&str> {
        match &self.state {
            SessionState::Connected { token } => Some(token),
            SessionState::Unconnected => None,
        }
    }

    /// Log in with email and passphrase and keep the returned token
    ///
    /// Every failure, including transport and decode errors, is reported as
    /// [`TinyCertError::Authentication`]. Connecting an already connected
    /// session replaces the token without releasing the old one.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            warn!("connect called on an already connected session; the previous token is dropped");
        }

        let fields = Fields::new()
            .with("email", &self.config.email)
            .with("passphrase", &self.config.passphrase);

        let response: ConnectResponse = self
            .send("connect", fields, None)
            .map_err(|e| TinyCertError::Authentication(Box::new(e)))?;

        self.state = SessionState::Connected {
            token: response.token,
        };
        info!("Connected to {}", self.config.server_url);
        Ok(())
    }

    /// Release the token on the server and forget it locally
    ///
    /// A failed disconnect leaves the session connected. Disconnecting an
    /// unconnected session does nothing.
    pub fn disconnect(&mut self) -> Result<()> {
        let token = match &self.state {
            SessionState::Unconnected => {
                debug!("disconnect on unconnected session ignored");
                return Ok(());
            }
            SessionState::Connected { token } => token.clone(),
        };

        let _: IgnoredAny = self.send("disconnect", Fields::new(), Some(&token))?;

        self.state = SessionState::Unconnected;
        info!("Disconnected from {}", self.config.server_url);
        Ok(())
    }

    /// Connect, run `f`, and disconnect on every exit path
    ///
    /// The error from `f` takes precedence over a failed disconnect. If `f`
    /// panics the session is still disconnected during unwinding.
    pub fn with_connection<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Self) -> Result<R>,
    {
        self.connect()?;

        let session = scopeguard::guard_on_unwind(self, |session| {
            if let Err(e) = session.disconnect() {
                warn!("Failed to disconnect while unwinding: {}", e);
            }
        });

        let result = f(&**session);
        let session = ScopeGuard::into_inner(session);
        let disconnected = session.disconnect();

        match (result, disconnected) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(disconnect_err)) => {
                warn!("Failed to disconnect after error: {}", disconnect_err);
                Err(e)
            }
        }
    }

    /// Canonicalize and sign `fields`, adding the token when connected
    pub fn prepare(&self, fields: Fields) -> SignedRequest {
        self.sign_fields(fields, self.token())
    }

    /// Authenticated call used by every resource operation
    pub(crate) fn call<R: DeserializeOwned>(&self, endpoint: &str, fields: Fields) -> Result<R> {
        let token = self.token().ok_or(TinyCertError::NotConnected)?;
        self.send(endpoint, fields, Some(token))
    }

    fn sign_fields(&self, mut fields: Fields, token: Option<&str>) -> SignedRequest {
        if let Some(token) = token {
            fields.push(TOKEN_FIELD, token);
        }
        fields.sort();

        let canonical = fields.to_canonical_form();
        let digest = sign(&canonical, &self.config.api_key);
        SignedRequest { canonical, digest }
    }

    fn send<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        fields: Fields,
        token: Option<&str>,
    ) -> Result<R> {
        let names: Vec<String> = fields.names().map(str::to_string).collect();
        let request = self.sign_fields(fields, token);
        debug!(endpoint, fields = ?names, authenticated = token.is_some(), "calling TinyCert");

        let url = self.config.endpoint_url(endpoint);
        let response = self.transport.post_form(&url, request.body())?;
        decode(endpoint, response)
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

/// Map a raw response onto the expected JSON shape
pub(crate) fn decode<R: DeserializeOwned>(endpoint: &str, response: RawResponse) -> Result<R> {
    if !response.is_ok() {
        debug!(endpoint, status = response.status, "TinyCert returned an error");
        return Err(TinyCertError::Server {
            status: response.status,
            body: response.body,
        });
    }

    serde_json::from_str(&response.body).map_err(|source| TinyCertError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}
