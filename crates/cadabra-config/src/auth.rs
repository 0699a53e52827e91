use secrecy::SecretString;
use serde::Deserialize;

/// Bearer token authentication
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Whether requests must carry a configured token
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Accepted tokens
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,

    /// Paths that skip authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tokens: Vec::new(),
            public_paths: default_public_paths(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Label used in logs, never the token itself
    pub name: String,
    pub token: SecretString,
    pub role: Role,
}

/// What a token may do
///
/// `staff` reaches the dashboard and everything a `service` token can;
/// `service` may only request assignments and mirror users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Service,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Service => "service",
        }
    }

    /// Whether this role includes everything `required` allows
    pub const fn grants(self, required: Self) -> bool {
        matches!((self, required), (Self::Staff, _) | (Self::Service, Self::Service))
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string()]
}
