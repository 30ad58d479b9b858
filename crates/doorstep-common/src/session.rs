use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier scoping one visitor's transcript and relay context.
///
/// Keys are produced by the session resolver (sanitized network identity or
/// anonymous token) and treated as plain strings everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner_value() {
        let key = SessionKey::new("203-0-113-5");
        assert_eq!(key.to_string(), "203-0-113-5");
        assert_eq!(key.as_str(), "203-0-113-5");
    }
}
