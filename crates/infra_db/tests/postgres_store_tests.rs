//! Settlement engine over the PostgreSQL adapters
//!
//! These tests start a PostgreSQL container and are ignored by default.
//! Run them with `cargo test -p infra_db -- --ignored` on a host with Docker.

use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{ActorId, BusinessId, GovernorateId, PackageId};
use domain_settlement::{
    ActorContext, AuditAction, AuditQuery, CollectionStatus, EngineConfig, PaymentRequest, Role,
    SettlementEngine, SettlementError, SettlementStatus, SettlementStore, StoreTransaction,
};
use infra_db::{PostgresDirectory, PostgresSettlementStore};
use test_utils::{
    assert_conflict, assert_settlement_balanced, DirectoryFixtures, MoneyFixtures,
    NewCollectionBuilder, RateFixtures, TestDatabase,
};

struct PgWorld {
    _db: TestDatabase,
    engine: SettlementEngine,
    store: Arc<PostgresSettlementStore>,
    agent: ActorContext,
    manager: ActorContext,
    accountant: ActorContext,
    business: BusinessId,
    package: PackageId,
}

async fn pg_world() -> PgWorld {
    let db = TestDatabase::new().await.expect("Failed to start test database");
    let governorate = GovernorateId::new();

    let agent = ActorContext::with_role(ActorId::new(), Role::Agent);
    let manager = ActorContext::with_role(ActorId::new(), Role::Manager);
    let accountant = ActorContext::with_role(ActorId::new(), Role::Accountant);

    db.seed_actor(&DirectoryFixtures::actor(agent.actor_id, Role::Agent, &[governorate]))
        .await
        .unwrap();
    db.seed_actor(&DirectoryFixtures::actor(manager.actor_id, Role::Manager, &[governorate]))
        .await
        .unwrap();
    db.seed_actor(&DirectoryFixtures::actor(accountant.actor_id, Role::Accountant, &[]))
        .await
        .unwrap();
    db.seed_agent_profile(&DirectoryFixtures::agent(
        agent.actor_id,
        governorate,
        Some(RateFixtures::ten_percent()),
    ))
    .await
    .unwrap();

    let business = BusinessId::new();
    db.seed_business(&DirectoryFixtures::business(business, governorate))
        .await
        .unwrap();
    let package = PackageId::new();
    db.seed_package(&DirectoryFixtures::package(package)).await.unwrap();

    let store = Arc::new(PostgresSettlementStore::new(db.pool().clone()));
    let directory = Arc::new(PostgresDirectory::new(db.pool().clone()));
    let engine = SettlementEngine::new(store.clone(), directory, EngineConfig::default());

    PgWorld {
        _db: db,
        engine,
        store,
        agent,
        manager,
        accountant,
        business,
        package,
    }
}

impl PgWorld {
    async fn record(&self, amount: rust_decimal::Decimal) {
        let request = NewCollectionBuilder::new()
            .with_agent(self.agent.actor_id)
            .with_business(self.business)
            .with_package(self.package)
            .with_amount(MoneyFixtures::iqd(amount))
            .build();
        self.engine.record_collection(&self.agent, request).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_full_settlement_cycle() {
    let world = pg_world().await;
    world.record(dec!(50000)).await;
    world.record(dec!(30000)).await;

    let settlement = world
        .engine
        .create_settlement(&world.manager, world.agent.actor_id, world.manager.actor_id)
        .await
        .unwrap();
    assert_eq!(settlement.status, SettlementStatus::Pending);
    assert_eq!(settlement.collection_ids.len(), 2);
    assert_settlement_balanced(&settlement);

    let reloaded = world.store.get_settlement(settlement.id).await.unwrap();
    assert_eq!(reloaded.collection_ids, settlement.collection_ids);
    assert_eq!(reloaded.total_collected.amount(), dec!(80000));

    let confirmed = world
        .engine
        .confirm_settlement(&world.accountant, settlement.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, SettlementStatus::Confirmed);

    let outstanding = world
        .engine
        .list_outstanding(&world.agent, world.agent.actor_id)
        .await
        .unwrap();
    assert!(outstanding.is_empty());

    let audit = world
        .store
        .list_audit_entries(&AuditQuery {
            entity_id: Some(*settlement.id.as_uuid()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(audit[0].action, AuditAction::SettlementConfirmed);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_second_open_settlement_conflicts() {
    let world = pg_world().await;
    world.record(dec!(50000)).await;

    world
        .engine
        .create_settlement(&world.manager, world.agent.actor_id, world.manager.actor_id)
        .await
        .unwrap();
    world.record(dec!(10000)).await;

    let second = world
        .engine
        .create_settlement(&world.manager, world.agent.actor_id, world.manager.actor_id)
        .await;
    assert_conflict(second);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_payment_beyond_balance_is_rejected() {
    let world = pg_world().await;
    world.record(dec!(20000)).await;

    let result = world
        .engine
        .submit_payment(
            &world.agent,
            PaymentRequest {
                agent_id: world.agent.actor_id,
                accountant_id: world.accountant.actor_id,
                amount: MoneyFixtures::iqd(dec!(25000)),
                notes: None,
            },
        )
        .await;
    assert!(matches!(result, Err(SettlementError::InsufficientBalance { .. })));

    let payments = world.store.list_payments(world.agent.actor_id).await.unwrap();
    assert!(payments.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_dropped_transaction_rolls_back() {
    let world = pg_world().await;
    world.record(dec!(50000)).await;

    {
        let mut tx = world.store.begin().await.unwrap();
        tx.lock_agent(world.agent.actor_id).await.unwrap();
        let mut collections = tx.outstanding_collections(world.agent.actor_id).await.unwrap();
        collections[0].status = CollectionStatus::Submitted;
        tx.update_collection(&collections[0]).await.unwrap();
    }

    let mut tx = world.store.begin().await.unwrap();
    let outstanding = tx.outstanding_collections(world.agent.actor_id).await.unwrap();
    assert_eq!(outstanding.len(), 1);
    tx.rollback().await.unwrap();
}
