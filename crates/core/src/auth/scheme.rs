//! Authentication schemes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an API key is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLocation {
    Query,
    Header,
    Cookie,
}

/// HTTP authentication scheme names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpScheme {
    Basic,
    Bearer,
    Digest,
    Other,
}

/// One OAuth flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthFlow {
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub refresh_url: Option<String>,
    #[serde(default)]
    pub scopes: BTreeMap<String, String>,
}

/// The OAuth flows a scheme supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthFlows {
    pub implicit: Option<OAuthFlow>,
    pub password: Option<OAuthFlow>,
    pub client_credentials: Option<OAuthFlow>,
    pub authorization_code: Option<OAuthFlow>,
}

/// An authentication scheme, OpenAPI style.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthScheme {
    /// API key in a query parameter, header or cookie.
    ApiKey {
        #[serde(rename = "in")]
        location: KeyLocation,
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
    /// HTTP authentication.
    Http {
        scheme: HttpScheme,
        #[serde(default)]
        bearer_format: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    /// OAuth 2.
    #[serde(rename = "oauth2")]
    OAuth2 {
        flows: OAuthFlows,
        #[serde(default)]
        description: Option<String>,
    },
    /// OpenID Connect discovery.
    OpenIdConnect {
        open_id_connect_url: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl AuthScheme {
    /// An API key sent in the named header.
    pub fn header(name: impl Into<String>) -> Self {
        AuthScheme::ApiKey {
            location: KeyLocation::Header,
            name: name.into(),
            description: None,
        }
    }

    /// HTTP bearer authentication.
    pub fn bearer() -> Self {
        AuthScheme::Http {
            scheme: HttpScheme::Bearer,
            bearer_format: None,
            description: None,
        }
    }
}
