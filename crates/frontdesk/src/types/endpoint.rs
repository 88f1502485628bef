//! Endpoint patterns for the unauthenticated allow-list.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, InvalidInputError};

/// Credential-issuance endpoints and public uploads.
const DEFAULT_EXEMPT: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/refresh",
    "/api/auth/check",
    "/api/auth/logout",
    "/uploads/*",
];

/// A path pattern: either an exact path or a prefix ending in `*`.
///
/// ```
/// use frontdesk::EndpointPattern;
///
/// let uploads = EndpointPattern::new("/uploads/*").unwrap();
/// assert!(uploads.matches("/uploads/rooms/42.jpg"));
/// assert!(!uploads.matches("/api/uploads"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EndpointPattern {
    Exact(String),
    Prefix(String),
}

impl EndpointPattern {
    /// Parse a pattern. It must start with `/`; a trailing `*` makes it a prefix.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();

        if !s.starts_with('/') {
            return Err(InvalidInputError::EndpointPattern {
                value: s.to_string(),
                reason: "must start with '/'".to_string(),
            }
            .into());
        }

        match s.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => Err(InvalidInputError::EndpointPattern {
                value: s.to_string(),
                reason: "'*' is only allowed at the end".to_string(),
            }
            .into()),
            Some(prefix) => Ok(Self::Prefix(prefix.to_string())),
            None if s.contains('*') => Err(InvalidInputError::EndpointPattern {
                value: s.to_string(),
                reason: "'*' is only allowed at the end".to_string(),
            }
            .into()),
            None => Ok(Self::Exact(s.trim_end_matches('/').to_string())),
        }
    }

    /// Returns true if the request path (query string ignored) matches.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match self {
            Self::Exact(exact) => path.trim_end_matches('/') == exact,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for EndpointPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => write!(f, "{}", exact),
            Self::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}

impl Serialize for EndpointPattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EndpointPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EndpointPattern::new(&s).map_err(serde::de::Error::custom)
    }
}

/// The allow-list of endpoints that never carry the access token and never
/// trigger a session refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExemptEndpoints(Vec<EndpointPattern>);

impl ExemptEndpoints {
    /// Build an allow-list from explicit patterns.
    pub fn new(patterns: Vec<EndpointPattern>) -> Self {
        Self(patterns)
    }

    /// Add a pattern to the list.
    pub fn push(&mut self, pattern: EndpointPattern) {
        self.0.push(pattern);
    }

    /// Returns true if any pattern matches the path.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.0.iter().any(|p| p.matches(path))
    }

    pub fn patterns(&self) -> &[EndpointPattern] {
        &self.0
    }
}

impl Default for ExemptEndpoints {
    fn default() -> Self {
        Self(
            DEFAULT_EXEMPT
                .iter()
                .filter_map(|p| EndpointPattern::new(p).ok())
                .collect(),
        )
    }
}
