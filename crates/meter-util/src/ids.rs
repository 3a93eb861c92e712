//! Strongly-typed identifiers for meterd

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::MeterError;

/// Identifier of a pre-verified actor (client, advisor or admin).
///
/// Issued by the external auth provider; meterd never mints these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse an actor ID, rejecting empty or whitespace-only input
    pub fn parse(id: &str) -> crate::Result<Self> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(MeterError::invalid_id("actor id cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a consultation session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| MeterError::invalid_id(format!("session id '{}': {}", s, e)))
    }
}

/// Unique identifier for an advisor earning record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EarningId(Uuid);

impl EarningId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EarningId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EarningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EarningId {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| MeterError::invalid_id(format!("earning id '{}': {}", s, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_id_equality() {
        let id1 = ActorId::new("client-1");
        let id2 = ActorId::new("client-1");
        let id3 = ActorId::new("advisor-1");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn actor_id_rejects_blank() {
        assert!(ActorId::parse("   ").is_err());
        assert_eq!(ActorId::parse(" user_2 ").unwrap().as_str(), "user_2");
    }

    #[test]
    fn session_id_uniqueness() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        assert_ne!(s1, s2);
    }

    #[test]
    fn session_id_parses_from_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn ids_serialize_deserialize() {
        let actor = ActorId::new("advisor-7");
        let json = serde_json::to_string(&actor).unwrap();
        assert_eq!(json, "\"advisor-7\"");
        let parsed: ActorId = serde_json::from_str(&json).unwrap();
        assert_eq!(actor, parsed);

        let earning = EarningId::new();
        let json = serde_json::to_string(&earning).unwrap();
        let parsed: EarningId = serde_json::from_str(&json).unwrap();
        assert_eq!(earning, parsed);
    }
}
