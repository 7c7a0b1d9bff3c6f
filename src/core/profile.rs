use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::ProfileId;

/// Header every component is matched from when none are configured
pub const USER_AGENT_HEADER: &str = "User-Agent";

/// A facet of a device (hardware, software, browser, crawler)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Human-readable name, unique within a data set
    pub name: String,

    /// Profile used when a match yields nothing for this component
    pub default_profile: ProfileId,

    /// HTTP headers this component is identified from, highest priority first
    pub http_headers: Vec<String>,
}

impl Component {
    /// Position of a header in this component's priority list, ignoring case.
    #[must_use]
    pub fn header_priority(&self, header: &str) -> Option<usize> {
        self.http_headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(header))
    }
}

/// A bundle of property values for one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,

    /// Index of the owning component in the data set
    pub component: usize,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Profile {
    /// Look up a property value by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_priority() {
        let component = Component {
            name: "Hardware".to_string(),
            default_profile: ProfileId(1),
            http_headers: vec!["Device-Stock-UA".to_string(), USER_AGENT_HEADER.to_string()],
        };
        assert_eq!(component.header_priority("device-stock-ua"), Some(0));
        assert_eq!(component.header_priority("USER-AGENT"), Some(1));
        assert_eq!(component.header_priority("Accept"), None);
    }

    #[test]
    fn test_property_lookup() {
        let profile = Profile {
            id: ProfileId(7),
            component: 0,
            properties: [("IsMobile".to_string(), "True".to_string())]
                .into_iter()
                .collect(),
        };
        assert_eq!(profile.property("IsMobile"), Some("True"));
        assert_eq!(profile.property("ScreenWidth"), None);
    }
}
