use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Identifier of a user in the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is asking to take part in an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Visitor without a session
    Anonymous,
    /// Signed-in user
    Authenticated(UserId),
}

impl Identity {
    /// The user behind this identity, if any
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(id) => Some(*id),
        }
    }

    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<UserId>> for Identity {
    fn from(id: Option<UserId>) -> Self {
        id.map_or(Self::Anonymous, Self::Authenticated)
    }
}

/// A user mirrored from the host application
///
/// Reports filter on `date_joined` and list `username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub date_joined: Timestamp,
}
