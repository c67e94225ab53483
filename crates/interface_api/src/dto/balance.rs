//! Balance DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::Money;
use domain_settlement::{Balance, Role};

/// A derived balance; informational, never authoritative
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub actor_id: Uuid,
    pub role: Role,
    pub current_balance: Money,
    pub accumulated_commission: Money,
    pub computed_at: DateTime<Utc>,
}

impl From<Balance> for BalanceResponse {
    fn from(b: Balance) -> Self {
        Self {
            actor_id: b.actor_id.into(),
            role: b.role,
            current_balance: b.current_balance,
            accumulated_commission: b.accumulated_commission,
            computed_at: b.computed_at,
        }
    }
}
