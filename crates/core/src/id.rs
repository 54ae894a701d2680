//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a bottle.
///
/// Always assigned by the remote system; the client never fabricates one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BottleId(i64);

impl BottleId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for BottleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for BottleId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<BottleId> for i64 {
    fn from(value: BottleId) -> Self {
        value.0
    }
}

impl FromStr for BottleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<i64>()
            .map_err(|e| DomainError::invalid_id(format!("BottleId: {e}")))?;
        Ok(Self(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_integer() {
        let id: BottleId = " 42 ".parse().unwrap();
        assert_eq!(id, BottleId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_non_numeric() {
        let err = "abc".parse::<BottleId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.starts_with("BottleId")));
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&BottleId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: BottleId = serde_json::from_str("7").unwrap();
        assert_eq!(back, BottleId::new(7));
    }
}
