//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{DateTime, Utc};
use core_kernel::{ActorId, BusinessId, GovernorateId, Money, PackageId, Rate};
use domain_settlement::{
    ActorContext, CommissionEventType, EngineConfig, InMemoryDirectory, InMemorySettlementStore,
    NewCollection, PaymentRequest, Role, SettlementEngine,
};
use std::sync::Arc;

use crate::fixtures::{DirectoryFixtures, IdFixtures, MoneyFixtures, RateFixtures};

/// Builder for collection payloads
pub struct NewCollectionBuilder {
    agent_id: ActorId,
    business_id: BusinessId,
    package_id: PackageId,
    amount: Money,
    collected_at: DateTime<Utc>,
    event_type: CommissionEventType,
}

impl Default for NewCollectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewCollectionBuilder {
    pub fn new() -> Self {
        Self {
            agent_id: IdFixtures::agent_id(),
            business_id: IdFixtures::business_id(),
            package_id: IdFixtures::package_id(),
            amount: MoneyFixtures::iqd_50000(),
            collected_at: Utc::now(),
            event_type: CommissionEventType::NewSubscription,
        }
    }

    pub fn with_agent(mut self, agent_id: ActorId) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub fn with_business(mut self, business_id: BusinessId) -> Self {
        self.business_id = business_id;
        self
    }

    pub fn with_package(mut self, package_id: PackageId) -> Self {
        self.package_id = package_id;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn collected_at(mut self, at: DateTime<Utc>) -> Self {
        self.collected_at = at;
        self
    }

    pub fn with_event_type(mut self, event_type: CommissionEventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn build(self) -> NewCollection {
        NewCollection {
            agent_id: self.agent_id,
            business_id: self.business_id,
            package_id: self.package_id,
            amount: self.amount,
            collected_at: self.collected_at,
            event_type: self.event_type,
        }
    }
}

/// An engine wired to in-memory adapters and a seeded directory
///
/// The directory holds one governorate with an agent, a manager, an
/// accountant, an admin, one business and one active package.
pub struct TestWorld {
    pub engine: Arc<SettlementEngine>,
    pub store: Arc<InMemorySettlementStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub governorate: GovernorateId,
    pub agent: ActorContext,
    pub manager: ActorContext,
    pub accountant: ActorContext,
    pub admin: ActorContext,
    pub business: BusinessId,
    pub package: PackageId,
}

impl TestWorld {
    /// A collection of `amount` by the world's agent at the world's business
    pub fn collection(&self, amount: Money) -> NewCollection {
        NewCollectionBuilder::new()
            .with_agent(self.agent.actor_id)
            .with_business(self.business)
            .with_package(self.package)
            .with_amount(amount)
            .build()
    }

    /// A hand-off of `amount` from the world's agent to the world's accountant
    pub fn payment(&self, amount: Money) -> PaymentRequest {
        PaymentRequest {
            agent_id: self.agent.actor_id,
            accountant_id: self.accountant.actor_id,
            amount,
            notes: None,
        }
    }

    /// Context for the world's actor holding `role`
    pub fn as_role(&self, role: Role) -> &ActorContext {
        match role {
            Role::Agent => &self.agent,
            Role::Manager => &self.manager,
            Role::Accountant => &self.accountant,
            Role::Admin => &self.admin,
        }
    }
}

/// Builder for [`TestWorld`]
pub struct TestWorldBuilder {
    config: EngineConfig,
    agent_rate: Option<Rate>,
    manager_governorates: Option<Vec<GovernorateId>>,
}

impl Default for TestWorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorldBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            agent_rate: Some(RateFixtures::ten_percent()),
            manager_governorates: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Agent commission rate; `None` leaves the agent unconfigured
    pub fn with_agent_rate(mut self, rate: Option<Rate>) -> Self {
        self.agent_rate = rate;
        self
    }

    /// Puts the manager in other governorates than the agent's
    pub fn with_manager_governorates(mut self, governorates: Vec<GovernorateId>) -> Self {
        self.manager_governorates = Some(governorates);
        self
    }

    pub async fn build(self) -> TestWorld {
        let store = Arc::new(InMemorySettlementStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let governorate = GovernorateId::new();

        let agent = ActorContext::with_role(ActorId::new(), Role::Agent);
        let manager = ActorContext::with_role(ActorId::new(), Role::Manager);
        let accountant = ActorContext::with_role(ActorId::new(), Role::Accountant);
        let admin = ActorContext::with_role(ActorId::new(), Role::Admin);
        let manager_governorates = self.manager_governorates.unwrap_or_else(|| vec![governorate]);

        directory
            .add_actor(DirectoryFixtures::actor(agent.actor_id, Role::Agent, &[governorate]))
            .await;
        directory
            .add_actor(DirectoryFixtures::actor(manager.actor_id, Role::Manager, &manager_governorates))
            .await;
        directory
            .add_actor(DirectoryFixtures::actor(accountant.actor_id, Role::Accountant, &[]))
            .await;
        directory
            .add_actor(DirectoryFixtures::actor(admin.actor_id, Role::Admin, &[]))
            .await;
        directory
            .add_agent(DirectoryFixtures::agent(agent.actor_id, governorate, self.agent_rate))
            .await;

        let business = BusinessId::new();
        directory
            .add_business(DirectoryFixtures::business(business, governorate))
            .await;
        let package = PackageId::new();
        directory.add_package(DirectoryFixtures::package(package)).await;

        let engine = Arc::new(SettlementEngine::new(
            store.clone(),
            directory.clone(),
            self.config,
        ));

        TestWorld {
            engine,
            store,
            directory,
            governorate,
            agent,
            manager,
            accountant,
            admin,
            business,
            package,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_collection_builder_defaults() {
        let request = NewCollectionBuilder::new().build();
        assert_eq!(request.agent_id, IdFixtures::agent_id());
        assert_eq!(request.amount, MoneyFixtures::iqd_50000());
        assert_eq!(request.event_type, CommissionEventType::NewSubscription);
    }

    #[test]
    fn test_collection_builder_overrides() {
        let request = NewCollectionBuilder::new()
            .with_amount(MoneyFixtures::iqd(dec!(1234)))
            .with_event_type(CommissionEventType::Renewal)
            .build();
        assert_eq!(request.amount.amount(), dec!(1234));
        assert_eq!(request.event_type, CommissionEventType::Renewal);
    }

    #[tokio::test]
    async fn test_world_records_a_collection() {
        let world = TestWorldBuilder::new().build().await;
        let (collection, commission) = world
            .engine
            .record_collection(&world.agent, world.collection(MoneyFixtures::iqd_50000()))
            .await
            .unwrap();

        assert_eq!(collection.agent_id, world.agent.actor_id);
        assert_eq!(commission.amount.amount(), dec!(5000));
    }

    #[tokio::test]
    async fn test_world_as_role() {
        let world = TestWorldBuilder::new().build().await;
        assert_eq!(world.as_role(Role::Accountant).actor_id, world.accountant.actor_id);
    }
}
