//! Acting identities and stateless authorization
//!
//! Every operation receives an `ActorContext` built from a short-lived,
//! already-verified credential. Nothing about the caller is kept between
//! requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ActorId, CoreError};
use crate::error::SettlementError;

/// Platform roles that take part in settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Agent,
    Accountant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Agent => "agent",
            Role::Accountant => "accountant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "agent" => Ok(Role::Agent),
            "accountant" => Ok(Role::Accountant),
            other => Err(CoreError::unknown_variant("role", other)),
        }
    }
}

/// The pre-authenticated caller of an engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: ActorId,
    pub roles: Vec<Role>,
}

impl ActorContext {
    pub fn new(actor_id: ActorId, roles: Vec<Role>) -> Self {
        Self { actor_id, roles }
    }

    /// Shorthand for a caller holding exactly one role
    pub fn with_role(actor_id: ActorId, role: Role) -> Self {
        Self::new(actor_id, vec![role])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Admins pass every role check
    pub fn require_any(&self, roles: &[Role], operation: &str) -> Result<(), SettlementError> {
        if self.is_admin() || roles.iter().any(|r| self.has_role(*r)) {
            return Ok(());
        }
        Err(SettlementError::unauthorized(format!(
            "{} may not {}",
            self.actor_id, operation
        )))
    }

    /// Passes for `subject` acting on itself in `self_role`, or for any of `roles`
    pub fn require_self_or(
        &self,
        subject: ActorId,
        self_role: Role,
        roles: &[Role],
        operation: &str,
    ) -> Result<(), SettlementError> {
        if self.actor_id == subject && self.has_role(self_role) {
            return Ok(());
        }
        self.require_any(roles, operation)
    }
}
