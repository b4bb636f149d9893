//! Normalized route strings.
//!
//! # Invariants
//! - Non-empty and starts with `/`
//! - No empty segments (`//`)
//! - No trailing `/`, except the root route `/` itself
//!
//! # Design Decisions
//! - Matching is on segment boundaries: `/foo` contains `/foo/bar` but not `/foobar`
//! - Routes are opaque keys; `:param` and `*rest` segments are kept as-is

use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;

use crate::routing::error::ConfigurationError;

/// A normalized dispatch key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Route(String);

impl Route {
    /// The root route `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Validate and normalize a route.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        if raw.is_empty() {
            return Err(ConfigurationError::EmptyRoute);
        }
        if !raw.starts_with('/') {
            return Err(ConfigurationError::MissingLeadingSlash(raw.to_string()));
        }
        Ok(Self(normalize(raw)))
    }

    /// Concatenate `child` under this route.
    ///
    /// Both sides are already normalized, so the only thing to fix up is the
    /// slash at the boundary (and the root cases on either side).
    pub fn join(&self, child: &Route) -> Route {
        if self.is_root() {
            return child.clone();
        }
        if child.is_root() {
            return self.clone();
        }
        Route(format!("{}{}", self.0, child.0))
    }

    /// Returns true if `route` lies under this mount route.
    pub fn contains(&self, route: &str) -> bool {
        if self.is_root() {
            return route.starts_with('/');
        }
        match route.strip_prefix(self.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Route {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Route {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collapse repeated slashes and strip a trailing one.
///
/// Callers must have checked that `raw` starts with `/`.
pub(crate) fn normalize(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if cleaned.is_empty() {
        cleaned.push('/');
    }
    cleaned
}
