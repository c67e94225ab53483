//! Read-only views of directory data owned by the CRUD layer
//!
//! Actors, agent profiles, businesses and packages are managed elsewhere;
//! the engine only reads them through `DirectoryPort`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use core_kernel::{ActorId, BusinessId, GovernorateId, Money, PackageId, Rate};
use crate::actor::Role;

/// Any platform user the engine may need to resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: ActorId,
    pub role: Role,
    pub display_name: String,
    /// Governorates the actor works in (agents) or supervises (managers)
    pub governorates: BTreeSet<GovernorateId>,
    pub is_active: bool,
}

impl ActorProfile {
    pub fn shares_governorate_with(&self, other: &BTreeSet<GovernorateId>) -> bool {
        !self.governorates.is_disjoint(other)
    }
}

/// Settlement-relevant attributes of a field agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: ActorId,
    pub governorates: BTreeSet<GovernorateId>,
    /// Configured commission percentage; `None` when never set
    pub commission_rate: Option<Rate>,
    /// A configured rate can be suspended without being deleted
    pub rate_active: bool,
    pub base_salary: Money,
}

impl AgentProfile {
    /// The rate commissions are computed with, if one is active
    pub fn active_rate(&self) -> Option<Rate> {
        if self.rate_active {
            self.commission_rate
        } else {
            None
        }
    }

    pub fn is_assigned_to(&self, governorate: GovernorateId) -> bool {
        self.governorates.contains(&governorate)
    }
}

/// A listed business paying for a subscription package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    pub governorate_id: GovernorateId,
}

/// A subscription package and its list price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub price: Money,
    pub is_active: bool,
}
