//! Service manifest consumed by the control plane.
//!
//! Describes a service's name, version and every registered route. The
//! manifest carries no opinion on transport; it is plain serde data.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic version of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// One registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub method: String,
    pub handler: String,
    pub route: String,
}

/// Full description of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: Version,
    pub routes: Vec<RouteSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_shape() {
        let manifest = Manifest {
            name: "shopping".into(),
            version: Version::default(),
            routes: vec![RouteSpec {
                method: "GET".into(),
                handler: "GET /items/:name".into(),
                route: "/items/:name".into(),
            }],
        };

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["version"]["patch"], 1);
        assert_eq!(json["routes"][0]["handler"], "GET /items/:name");
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
    }
}
