//! Balance ledger
//!
//! Balances are never stored and mutated. They are recomputed from a
//! snapshot of the event records every time, and the cache in front of the
//! display path only ever holds a value produced by [`BalanceLedger::compute`].
//!
//! | role       | current balance                                   |
//! |------------|---------------------------------------------------|
//! | agent      | Σ COLLECTED collections − Σ RECEIVED submissions  |
//! | manager    | Σ net cash due of CONFIRMED settlements managed   |
//! | accountant | Σ submissions received                            |
//! | admin      | zero                                              |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use core_kernel::{ActorId, Currency, Money};
use crate::actor::Role;
use crate::collection::{Collection, CollectionStatus};
use crate::commission::Commission;
use crate::error::SettlementError;
use crate::payment::{PaymentSubmission, PaymentSubmissionStatus};
use crate::settlement::{Settlement, SettlementStatus};

/// Records relevant to one actor's balance, read in a single store call
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub actor_id: ActorId,
    pub role: Role,
    pub collections: Vec<Collection>,
    pub commissions: Vec<Commission>,
    pub payments: Vec<PaymentSubmission>,
    pub settlements: Vec<Settlement>,
}

impl LedgerSnapshot {
    pub fn empty(actor_id: ActorId, role: Role) -> Self {
        Self {
            actor_id,
            role,
            collections: Vec::new(),
            commissions: Vec::new(),
            payments: Vec::new(),
            settlements: Vec::new(),
        }
    }
}

/// Derived balance of one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub actor_id: ActorId,
    pub role: Role,
    pub current_balance: Money,
    pub accumulated_commission: Money,
    pub computed_at: DateTime<Utc>,
}

/// Pure balance computation over a snapshot
#[derive(Debug, Clone, Copy)]
pub struct BalanceLedger {
    currency: Currency,
}

impl BalanceLedger {
    pub fn new(currency: Currency) -> Self {
        Self { currency }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn compute(&self, snapshot: &LedgerSnapshot) -> Result<Balance, SettlementError> {
        let zero = Money::zero(self.currency);
        let actor = snapshot.actor_id;

        let (current_balance, accumulated_commission) = match snapshot.role {
            Role::Agent => {
                let held = Money::sum(
                    self.currency,
                    snapshot
                        .collections
                        .iter()
                        .filter(|c| c.agent_id == actor && c.status == CollectionStatus::Collected)
                        .map(|c| &c.amount),
                )?;
                let handed_over = Money::sum(
                    self.currency,
                    snapshot
                        .payments
                        .iter()
                        .filter(|p| p.agent_id == actor && p.status == PaymentSubmissionStatus::Received)
                        .map(|p| &p.amount),
                )?;
                let earned = Money::sum(
                    self.currency,
                    snapshot
                        .commissions
                        .iter()
                        .filter(|c| c.agent_id == actor && c.is_earned())
                        .map(|c| &c.amount),
                )?;
                (held.checked_sub(&handed_over)?, earned)
            }
            Role::Manager => {
                let mut due = zero;
                for settlement in snapshot
                    .settlements
                    .iter()
                    .filter(|s| s.manager_id == actor && s.status == SettlementStatus::Confirmed)
                {
                    due = due.checked_add(&settlement.net_cash_due()?)?;
                }
                (due, zero)
            }
            Role::Accountant => {
                let received = Money::sum(
                    self.currency,
                    snapshot
                        .payments
                        .iter()
                        .filter(|p| p.accountant_id == actor)
                        .map(|p| &p.amount),
                )?;
                (received, zero)
            }
            Role::Admin => (zero, zero),
        };

        Ok(Balance {
            actor_id: actor,
            role: snapshot.role,
            current_balance,
            accumulated_commission,
            computed_at: Utc::now(),
        })
    }
}

/// TTL cache for balances served on the display path
///
/// Every actor carries a generation that [`BalanceCache::invalidate`] bumps.
/// A reader takes the generation before loading its snapshot and the value
/// is only stored if no write invalidated the actor in between.
///
/// A zero TTL disables caching.
#[derive(Debug)]
pub struct BalanceCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<ActorId, (Balance, Instant)>,
    generations: HashMap<ActorId, u64>,
}

impl CacheState {
    fn generation(&self, actor_id: ActorId) -> u64 {
        self.generations.get(&actor_id).copied().unwrap_or(0)
    }
}

impl BalanceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub async fn get(&self, actor_id: ActorId) -> Option<Balance> {
        if self.ttl.is_zero() {
            return None;
        }
        let state = self.state.read().await;
        state
            .entries
            .get(&actor_id)
            .filter(|(_, stored_at)| stored_at.elapsed() < self.ttl)
            .map(|(balance, _)| balance.clone())
    }

    /// Generation to hand back to [`BalanceCache::put`]
    pub async fn generation(&self, actor_id: ActorId) -> u64 {
        self.state.read().await.generation(actor_id)
    }

    /// Stores a balance computed after `generation` was read
    ///
    /// Returns false and drops the value if the actor was invalidated since.
    pub async fn put(&self, balance: Balance, generation: u64) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let mut state = self.state.write().await;
        if state.generation(balance.actor_id) != generation {
            return false;
        }
        state
            .entries
            .insert(balance.actor_id, (balance, Instant::now()));
        true
    }

    pub async fn invalidate(&self, actors: &[ActorId]) {
        let mut state = self.state.write().await;
        for actor in actors {
            state.entries.remove(actor);
            *state.generations.entry(*actor).or_insert(0) += 1;
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }
}
