//! Actor roles and the capability set attached to each

use meter_util::{ActorId, MeterError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role of a pre-verified actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Books and pays for sessions
    Client,
    /// Runs sessions and receives earnings
    Advisor,
    /// Platform operator; also drives internal billing calls
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Advisor => "advisor",
            Role::Admin => "admin",
        }
    }

    pub fn can_start_session(&self) -> bool {
        matches!(self, Role::Client)
    }

    pub fn can_set_pricing(&self) -> bool {
        matches!(self, Role::Advisor)
    }

    pub fn can_receive_earnings(&self) -> bool {
        matches!(self, Role::Advisor)
    }

    /// Ticks, internal debits, refunds and payouts
    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl FromStr for Role {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // The auth provider historically labels clients as "user"
            "client" | "user" => Ok(Role::Client),
            "advisor" => Ok(Role::Advisor),
            "admin" => Ok(Role::Admin),
            other => Err(MeterError::UnknownRole(other.to_string())),
        }
    }
}

/// A caller whose identity was established by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// The actor is `owner`, or an admin acting on their behalf
    pub fn can_act_for(&self, owner: &ActorId) -> bool {
        &self.id == owner || self.role.can_administer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_are_disjoint() {
        assert!(Role::Client.can_start_session());
        assert!(!Role::Advisor.can_start_session());
        assert!(Role::Advisor.can_receive_earnings());
        assert!(!Role::Client.can_receive_earnings());
        assert!(Role::Admin.can_administer());
        assert!(!Role::Advisor.can_administer());
    }

    #[test]
    fn parse_role() {
        assert_eq!("Client".parse::<Role>().unwrap(), Role::Client);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Client);
        assert_eq!("advisor".parse::<Role>().unwrap(), Role::Advisor);
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(MeterError::UnknownRole(_))
        ));
    }

    #[test]
    fn admin_acts_for_anyone() {
        let owner = ActorId::new("client-1");
        assert!(Actor::new("client-1", Role::Client).can_act_for(&owner));
        assert!(!Actor::new("client-2", Role::Client).can_act_for(&owner));
        assert!(Actor::new("ops", Role::Admin).can_act_for(&owner));
    }
}
