//! Credentials.

use crate::{
    BoxFuture, Error,
    auth::{AuthConfig, AuthScheme, KeyLocation},
};
use anyhow::Result;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Header map produced by a credential.
pub type Headers = BTreeMap<String, String>;

/// A credential: produces a token and request headers.
pub trait Credential: Send + Sync {
    /// Short name of the credential kind, used in errors.
    fn kind(&self) -> &'static str;

    /// The current token, if any.
    fn token(&self) -> Option<String>;

    /// Headers to attach to outgoing requests.
    fn headers(&self, config: &AuthConfig) -> Headers;

    /// Whether [`Credential::refresh`] can succeed.
    fn can_refresh(&self) -> bool {
        false
    }

    /// Refresh the token.
    ///
    /// Fails with [`Error::RefreshUnsupported`] unless the credential
    /// overrides it.
    fn refresh(&self) -> BoxFuture<'_, Result<()>> {
        let kind = self.kind();
        Box::pin(async move { Err(Error::RefreshUnsupported(kind.to_owned()).into()) })
    }
}

/// An API key.
#[derive(Clone)]
pub struct ApiKeyCredential {
    key: String,
}

impl ApiKeyCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Credential for ApiKeyCredential {
    fn kind(&self) -> &'static str {
        "api_key"
    }

    fn token(&self) -> Option<String> {
        Some(self.key.clone())
    }

    /// Only header placement produces headers; query and cookie keys are
    /// the transport's concern.
    fn headers(&self, config: &AuthConfig) -> Headers {
        match &config.scheme {
            AuthScheme::ApiKey {
                location: KeyLocation::Header,
                name,
                ..
            } => Headers::from([(name.clone(), self.key.clone())]),
            _ => Headers::new(),
        }
    }
}

/// HTTP basic authentication.
#[derive(Clone)]
pub struct BasicCredential {
    username: String,
    password: String,
}

impl BasicCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Credential for BasicCredential {
    fn kind(&self) -> &'static str {
        "basic"
    }

    fn token(&self) -> Option<String> {
        Some(STANDARD.encode(format!("{}:{}", self.username, self.password)))
    }

    fn headers(&self, _config: &AuthConfig) -> Headers {
        let token = self.token().unwrap_or_default();
        Headers::from([("Authorization".to_owned(), format!("Basic {token}"))])
    }
}

/// A static bearer token.
#[derive(Clone)]
pub struct BearerCredential {
    token: String,
}

impl BearerCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Credential for BearerCredential {
    fn kind(&self) -> &'static str {
        "bearer"
    }

    fn token(&self) -> Option<String> {
        Some(self.token.clone())
    }

    fn headers(&self, _config: &AuthConfig) -> Headers {
        Headers::from([("Authorization".to_owned(), format!("Bearer {}", self.token))])
    }
}

/// Result of an OAuth2 token refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: Option<i64>,
}

/// Exchanges a refresh token for a new grant.
pub type RefreshFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<TokenGrant>> + Send + Sync>;

/// Tokens are treated as expired this long before their deadline.
const EXPIRY_SKEW_SECS: i64 = 30;

struct OAuth2State {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// An OAuth2 access token with optional refresh capability.
pub struct OAuth2Credential {
    state: RwLock<OAuth2State>,
    refresher: Option<RefreshFn>,
}

impl OAuth2Credential {
    /// Create a credential; `expires_in` is in seconds from now.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
    ) -> Self {
        Self {
            state: RwLock::new(OAuth2State {
                access_token: access_token.into(),
                refresh_token,
                expires_at: expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            }),
            refresher: None,
        }
    }

    /// Set the function used to refresh the token.
    pub fn with_refresher<F>(mut self, refresher: F) -> Self
    where
        F: Fn(String) -> BoxFuture<'static, Result<TokenGrant>> + Send + Sync + 'static,
    {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    /// Whether the token expires within the skew window.
    pub fn is_expired(&self) -> bool {
        match self.state.read().expires_at {
            Some(at) => at - Duration::seconds(EXPIRY_SKEW_SECS) < Utc::now(),
            None => false,
        }
    }
}

impl Credential for OAuth2Credential {
    fn kind(&self) -> &'static str {
        "oauth2"
    }

    fn token(&self) -> Option<String> {
        Some(self.state.read().access_token.clone())
    }

    fn headers(&self, _config: &AuthConfig) -> Headers {
        let token = self.state.read().access_token.clone();
        Headers::from([("Authorization".to_owned(), format!("Bearer {token}"))])
    }

    fn can_refresh(&self) -> bool {
        self.refresher.is_some() && self.state.read().refresh_token.is_some()
    }

    fn refresh(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let refresh_token = self.state.read().refresh_token.clone();
            let (Some(refresher), Some(refresh_token)) = (&self.refresher, refresh_token) else {
                return Err(Error::RefreshUnsupported(self.kind().to_owned()).into());
            };

            let grant = refresher(refresh_token).await?;
            let mut state = self.state.write();
            state.access_token = grant.access_token;
            if let Some(token) = grant.refresh_token {
                state.refresh_token = Some(token);
            }
            if let Some(secs) = grant.expires_in {
                state.expires_at = Some(Utc::now() + Duration::seconds(secs));
            }
            tracing::debug!("oauth2 token refreshed");
            Ok(())
        })
    }
}

impl fmt::Debug for OAuth2Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Credential")
            .field("expires_at", &self.state.read().expires_at)
            .field("refreshable", &self.can_refresh())
            .finish()
    }
}
