//! Authentication collaborators.
//!
//! The engine never authenticates anything itself. Tools and transports
//! receive an [`AuthHandler`] and ask it for a token or headers.

pub use {
    credential::{
        ApiKeyCredential, BasicCredential, BearerCredential, Credential, Headers,
        OAuth2Credential, RefreshFn, TokenGrant,
    },
    scheme::{AuthScheme, HttpScheme, KeyLocation, OAuthFlow, OAuthFlows},
};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

mod credential;
mod scheme;

/// Authentication configuration for a tool or transport.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuthConfig {
    /// The authentication scheme.
    pub scheme: AuthScheme,

    /// Additional context properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl AuthConfig {
    pub fn new(scheme: AuthScheme) -> Self {
        Self {
            scheme,
            context: None,
        }
    }
}

/// A scheme paired with an optional credential.
#[derive(Clone)]
pub struct AuthHandler {
    /// The authentication configuration.
    pub config: AuthConfig,

    /// The credential, if one has been obtained.
    pub credential: Option<Arc<dyn Credential>>,
}

impl AuthHandler {
    pub fn new(config: AuthConfig, credential: Option<Arc<dyn Credential>>) -> Self {
        Self { config, credential }
    }

    /// The current token, if a credential is present.
    pub fn token(&self) -> Option<String> {
        self.credential.as_ref().and_then(|c| c.token())
    }

    /// Request headers; empty without a credential.
    pub fn headers(&self) -> Headers {
        self.credential
            .as_ref()
            .map(|c| c.headers(&self.config))
            .unwrap_or_default()
    }

    /// Refresh the credential's token.
    ///
    /// Fails when there is no credential or it cannot refresh.
    pub async fn refresh(&self) -> Result<()> {
        match &self.credential {
            Some(credential) => credential.refresh().await,
            None => Err(crate::Error::RefreshUnsupported("missing".to_owned()).into()),
        }
    }
}

impl fmt::Debug for AuthHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHandler")
            .field("config", &self.config)
            .field("credential", &self.credential.as_ref().map(|c| c.kind()))
            .finish()
    }
}
