use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Multi-valued CAS attributes keyed by normalised (lowercase, unprefixed) name.
pub type Attrs = BTreeMap<String, Vec<String>>;

/// Identity established by a successful ticket validation or the dev bypass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CasPrincipal {
    pub user: String,
    #[serde(default)]
    pub attributes: Attrs,
}

impl CasPrincipal {
    pub fn new<S: Into<String>>(user: S) -> Self {
        Self { user: user.into(), attributes: Attrs::new() }
    }

    pub fn with_attributes(mut self, attributes: Attrs) -> Self {
        self.attributes = attributes;
        self
    }
}
