//! Issuer records and path-based issuer resolution.
use std::fmt;

use url::Url;

/// Identifier of a configured issuer (the key of its key-set cache entry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssuerId(String);

impl IssuerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the key set of an issuer is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerRecord {
    pub id: IssuerId,
    pub url: Url,
}

/// A path-substring rule selecting an issuer in multi-tenant deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerRoute {
    pub pattern: String,
    pub issuer: IssuerId,
}

#[derive(Debug, Clone)]
pub enum IssuerResolver {
    /// One fixed issuer for every request.
    Single(IssuerId),
    /// Routes in declared order; the first whose pattern is contained in the path wins.
    Multi(Vec<IssuerRoute>),
}

impl IssuerResolver {
    pub fn resolve(&self, path: &str) -> Option<&IssuerId> {
        match self {
            Self::Single(issuer) => Some(issuer),
            Self::Multi(routes) => routes
                .iter()
                .find(|route| path.contains(route.pattern.as_str()))
                .map(|route| &route.issuer),
        }
    }
}
