//! HTTP tests against the router with in-memory adapters

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use domain_settlement::ActorContext;
use interface_api::{auth::create_token, config::ApiConfig, create_router};
use test_utils::{TestWorld, TestWorldBuilder};

struct Api {
    router: Router,
    world: TestWorld,
    secret: String,
}

async fn api() -> Api {
    api_with(TestWorldBuilder::new()).await
}

async fn api_with(builder: TestWorldBuilder) -> Api {
    let world = builder.build().await;
    let config = ApiConfig {
        jwt_secret: "api-test-secret".to_string(),
        ..Default::default()
    };
    let secret = config.jwt_secret.clone();
    Api {
        router: create_router(world.engine.clone(), config),
        world,
        secret,
    }
}

impl Api {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        actor: Option<&ActorContext>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            let token = create_token(actor, &self.secret, 300).expect("token");
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router dispatch");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        (status, payload)
    }

    async fn get(&self, uri: &str, actor: &ActorContext) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(actor), None).await
    }

    async fn post(&self, uri: &str, actor: &ActorContext, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(actor), Some(body)).await
    }

    async fn collect(&self, amount: &str) -> Value {
        let (status, payload) = self
            .post(
                "/api/v1/collections",
                &self.world.agent,
                json!({
                    "business_id": self.world.business.as_uuid(),
                    "package_id": self.world.package.as_uuid(),
                    "amount": amount,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{payload}");
        payload
    }

    async fn create_settlement(&self) -> (StatusCode, Value) {
        self.post(
            "/api/v1/settlements",
            &self.world.manager,
            json!({ "agent_id": self.world.agent.actor_id.as_uuid() }),
        )
        .await
    }
}

fn amount(money: &Value) -> Decimal {
    money["amount"]
        .as_str()
        .expect("amount as string")
        .parse::<Decimal>()
        .expect("decimal")
        .normalize()
}

#[tokio::test]
async fn health_is_public() {
    let api = api().await;
    let (status, payload) = api.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "healthy");

    let (status, payload) = api.send(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "ready");
    assert_eq!(payload["adapters"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn api_routes_require_a_bearer_token() {
    let api = api().await;
    let uri = format!("/api/v1/actors/{}/balance", api.world.agent.actor_id.as_uuid());
    let (status, payload) = api.send(Method::GET, &uri, None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payload["error"], "unauthorized");
}

#[tokio::test]
async fn collect_settle_and_confirm() {
    let api = api().await;
    let recorded = api.collect("50000").await;
    assert_eq!(amount(&recorded["commission"]["amount"]), dec!(5000));
    assert_eq!(recorded["collection"]["status"], "COLLECTED");

    let (status, settlement) = api.create_settlement().await;
    assert_eq!(status, StatusCode::CREATED, "{settlement}");
    assert_eq!(settlement["status"], "PENDING");
    assert_eq!(amount(&settlement["total_collected"]), dec!(50000));
    assert_eq!(amount(&settlement["total_commissions"]), dec!(5000));
    assert_eq!(amount(&settlement["amount_delivered"]), dec!(45000));

    let confirm_uri = format!("/api/v1/settlements/{}/confirm", settlement["id"].as_str().unwrap());
    let (status, confirmed) = api.post(&confirm_uri, &api.world.accountant, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{confirmed}");
    assert_eq!(confirmed["status"], "CONFIRMED");

    let (status, again) = api.post(&confirm_uri, &api.world.accountant, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again, confirmed);

    let outstanding_uri = format!("/api/v1/agents/{}/outstanding", api.world.agent.actor_id.as_uuid());
    let (status, outstanding) = api.get(&outstanding_uri, &api.world.agent).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outstanding, json!([]));
}

#[tokio::test]
async fn payment_beyond_balance_is_unprocessable() {
    let api = api().await;
    api.collect("20000").await;

    let (status, payload) = api
        .post(
            "/api/v1/payments",
            &api.world.agent,
            json!({
                "accountant_id": api.world.accountant.actor_id.as_uuid(),
                "amount": "30000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(payload["error"], "insufficient_balance");

    let balance_uri = format!("/api/v1/actors/{}/balance", api.world.agent.actor_id.as_uuid());
    let (status, balance) = api.get(&balance_uri, &api.world.agent).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&balance["current_balance"]), dec!(20000));
}

#[tokio::test]
async fn payment_within_balance_is_listed() {
    let api = api().await;
    api.collect("20000").await;

    let (status, payment) = api
        .post(
            "/api/v1/payments",
            &api.world.agent,
            json!({
                "accountant_id": api.world.accountant.actor_id.as_uuid(),
                "amount": "15000",
                "notes": "Friday hand-off",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");

    let uri = format!("/api/v1/agents/{}/payments", api.world.agent.actor_id.as_uuid());
    let (status, payments) = api.get(&uri, &api.world.accountant).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments.as_array().map(Vec::len), Some(1));
    assert_eq!(payments[0]["id"], payment["id"]);
}

#[tokio::test]
async fn payment_during_pending_settlement_conflicts() {
    let api = api().await;
    api.collect("50000").await;
    let (status, _) = api.create_settlement().await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, payload) = api
        .post(
            "/api/v1/payments",
            &api.world.agent,
            json!({
                "accountant_id": api.world.accountant.actor_id.as_uuid(),
                "amount": "20000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(payload["error"], "conflict");
}

#[tokio::test]
async fn rejected_settlement_returns_collections() {
    let api = api().await;
    let recorded = api.collect("50000").await;
    let (_, settlement) = api.create_settlement().await;

    let uri = format!("/api/v1/settlements/{}/reject", settlement["id"].as_str().unwrap());
    let (status, rejected) = api
        .post(&uri, &api.world.accountant, json!({ "reason": "Cash count short" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{rejected}");
    assert_eq!(rejected["status"], "REJECTED");
    assert_eq!(rejected["rejection_reason"], "Cash count short");

    let outstanding_uri = format!("/api/v1/agents/{}/outstanding", api.world.agent.actor_id.as_uuid());
    let (_, outstanding) = api.get(&outstanding_uri, &api.world.manager).await;
    assert_eq!(outstanding[0]["id"], recorded["collection"]["id"]);
}

#[tokio::test]
async fn second_open_settlement_conflicts() {
    let api = api().await;
    api.collect("50000").await;
    let (status, _) = api.create_settlement().await;
    assert_eq!(status, StatusCode::CREATED);

    api.collect("10000").await;
    let (status, payload) = api.create_settlement().await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(payload["error"], "conflict");
}

#[tokio::test]
async fn agents_cannot_confirm() {
    let api = api().await;
    api.collect("50000").await;
    let (_, settlement) = api.create_settlement().await;

    let uri = format!("/api/v1/settlements/{}/confirm", settlement["id"].as_str().unwrap());
    let (status, payload) = api.post(&uri, &api.world.agent, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payload["error"], "forbidden");
}

#[tokio::test]
async fn empty_rejection_reason_fails_validation() {
    let api = api().await;
    api.collect("50000").await;
    let (_, settlement) = api.create_settlement().await;

    let uri = format!("/api/v1/settlements/{}/reject", settlement["id"].as_str().unwrap());
    let (status, payload) = api.post(&uri, &api.world.manager, json!({ "reason": "" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(payload["error"], "validation_error");
    assert!(payload["details"][0].as_str().unwrap().starts_with("reason"));
}

#[tokio::test]
async fn non_positive_collection_fails_validation() {
    let api = api().await;
    let (status, payload) = api
        .post(
            "/api/v1/collections",
            &api.world.agent,
            json!({
                "business_id": api.world.business.as_uuid(),
                "package_id": api.world.package.as_uuid(),
                "amount": "0",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(payload["error"], "validation_error");
}

#[tokio::test]
async fn unknown_settlement_is_not_found() {
    let api = api().await;
    let uri = format!("/api/v1/settlements/{}", uuid::Uuid::now_v7());
    let (status, payload) = api.get(&uri, &api.world.admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["error"], "not_found");
}

#[tokio::test]
async fn missing_rate_is_a_configuration_error() {
    let api = api_with(TestWorldBuilder::new().with_agent_rate(None)).await;
    let (status, payload) = api
        .post(
            "/api/v1/collections",
            &api.world.agent,
            json!({
                "business_id": api.world.business.as_uuid(),
                "package_id": api.world.package.as_uuid(),
                "amount": "50000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(payload["error"], "configuration_error");
}

#[tokio::test]
async fn quote_rounds_half_up() {
    let api = api().await;
    let (status, quote) = api
        .post(
            "/api/v1/commissions/quote",
            &api.world.manager,
            json!({
                "agent_id": api.world.agent.actor_id.as_uuid(),
                "event_type": "RENEWAL",
                "base_amount": "0.005",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(amount(&quote["amount"]), dec!(0.001));
}

#[tokio::test]
async fn commission_approval_and_cancellation() {
    let api = api().await;
    let first = api.collect("50000").await;
    let second = api.collect("30000").await;

    let uri = format!("/api/v1/commissions/{}/approve", first["commission"]["id"].as_str().unwrap());
    let (status, approved) = api.post(&uri, &api.world.manager, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["status"], "APPROVED");

    let uri = format!("/api/v1/commissions/{}/cancel", second["commission"]["id"].as_str().unwrap());
    let (status, cancelled) = api
        .post(&uri, &api.world.manager, json!({ "reason": "Duplicate entry" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["status"], "CANCELLED");
}

#[tokio::test]
async fn audit_log_is_restricted() {
    let api = api().await;
    api.collect("50000").await;

    let (status, entries) = api.get("/api/v1/audit?limit=10", &api.world.admin).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"COLLECTION_RECORDED"));

    let (status, _) = api.get("/api/v1/audit", &api.world.agent).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn settlements_filter_by_status() {
    let api = api().await;
    api.collect("50000").await;
    api.create_settlement().await;

    let (status, pending) = api
        .get("/api/v1/settlements?status=PENDING", &api.world.accountant)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().map(Vec::len), Some(1));

    let (_, confirmed) = api
        .get("/api/v1/settlements?status=CONFIRMED", &api.world.accountant)
        .await;
    assert_eq!(confirmed, json!([]));
}
