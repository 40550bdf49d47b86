use std::fmt;

use serde::Serialize;

/// Identity of a call boundary in the foreign system: the owning type plus
/// the operation name. Points are declared once at startup and never change;
/// the argument shape is carried by the host's call type, not by the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExtensionPoint {
    pub owner: &'static str,
    pub operation: &'static str,
}

impl ExtensionPoint {
    pub const fn new(owner: &'static str, operation: &'static str) -> Self {
        ExtensionPoint { owner, operation }
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.operation)
    }
}
