use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical width of a security key (6-digit company key + 3-digit issue key).
pub const SECURITY_KEY_WIDTH: usize = 9;

/// Opaque fixed-width security identifier.
///
/// The engine never parses the contents. The only check ever applied is the
/// width test in [`SecurityKey::is_well_formed`], used to sanitize output columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityKey(pub String);

impl SecurityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the key has exactly `width` characters.
    pub fn is_well_formed(&self, width: usize) -> bool {
        self.0.chars().count() == width
    }
}

impl fmt::Display for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SecurityKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SecurityKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_is_exact_width() {
        assert!(SecurityKey::from("001690001").is_well_formed(SECURITY_KEY_WIDTH));
        assert!(!SecurityKey::from("00169001").is_well_formed(SECURITY_KEY_WIDTH));
        assert!(!SecurityKey::from("0016900010").is_well_formed(SECURITY_KEY_WIDTH));
        assert!(!SecurityKey::from("AAPL").is_well_formed(SECURITY_KEY_WIDTH));
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = SecurityKey::from("001690001");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"001690001\"");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut keys = vec![SecurityKey::from("184996001"), SecurityKey::from("001690001")];
        keys.sort();
        assert_eq!(keys[0].as_str(), "001690001");
    }
}
