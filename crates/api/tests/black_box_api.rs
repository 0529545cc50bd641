use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::StatusCode;
use reqwest::header::HOST;
use serde_json::{Value, json};

use storefront_api::Config;
use storefront_api::app::seed::DEMO_PASSWORD;
use storefront_auth::{JwtClaims, Role};
use storefront_core::{TenantId, UserId};

const JWT_SECRET: &str = "black-box-secret";
const DEMO_HOST: &str = "demo-store.local";
const TEST_HOST: &str = "test-store.local";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, seeded, on an ephemeral port.
        let config = Config {
            jwt_secret: JWT_SECRET.to_string(),
            bcrypt_cost: 4,
            seed_demo_data: true,
            ..Config::default()
        };
        let app = storefront_api::build_app(config).await.expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn get(&self, host: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url, path)).header(HOST, host)
    }

    fn post(&self, host: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url, path)).header(HOST, host)
    }

    fn put(&self, host: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.put(format!("{}{}", self.base_url, path)).header(HOST, host)
    }

    fn delete(&self, host: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(format!("{}{}", self.base_url, path)).header(HOST, host)
    }

    async fn login(&self, host: &str, email: &str) -> String {
        let res = self
            .post(host, "/auth/login")
            .json(&json!({ "email": email, "password": DEMO_PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED, "login failed for {email}");
        let body: Value = res.json().await.unwrap();
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Tenant id by slug, through the administrative API.
    async fn tenant_id(&self, slug: &str) -> String {
        let token = self.login("localhost", "superadmin@storefront-processor.com").await;
        let tenants: Vec<Value> = self
            .get("anything.invalid", "/admin/tenants")
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        tenants
            .iter()
            .find(|t| t["slug"] == slug)
            .and_then(|t| t["id"].as_str())
            .expect("seeded tenant missing")
            .to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, role: Role, tenant_id: Option<TenantId>, issued_at: chrono::DateTime<Utc>) -> String {
    let claims = JwtClaims::new(sub, "minted@shop.test", role, tenant_id, issued_at, ChronoDuration::minutes(10));
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn decode_claims(token: &str) -> Value {
    jsonwebtoken::decode::<Value>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .expect("token should verify with the server secret")
    .claims
}

#[tokio::test]
async fn unknown_hostname_is_rejected_before_any_handler() {
    let server = TestServer::spawn().await;

    let res = server.get("nowhere.test", "/users").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Tenant not found for domain: nowhere.test");

    // Health probes are outside the pipeline.
    let res = server.get("nowhere.test", "/health").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_token_carries_role_and_tenant() {
    let server = TestServer::spawn().await;
    let demo_id = server.tenant_id("demo-store").await;

    let token = server.login(DEMO_HOST, "customer@demo-store.com").await;
    let claims = decode_claims(&token);
    assert_eq!(claims["role"], "CUSTOMER");
    assert_eq!(claims["tenantId"], demo_id.as_str());
    assert_eq!(claims["email"], "customer@demo-store.com");
}

#[tokio::test]
async fn login_validates_its_input_and_hides_which_part_was_wrong() {
    let server = TestServer::spawn().await;

    let res = server
        .post(DEMO_HOST, "/auth/login")
        .json(&json!({ "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Email is required");

    let wrong_password = server
        .post(DEMO_HOST, "/auth/login")
        .json(&json!({ "email": "admin@demo-store.com", "password": "nope" }))
        .send()
        .await
        .unwrap();
    let unknown_user = server
        .post(DEMO_HOST, "/auth/login")
        .json(&json!({ "email": "ghost@demo-store.com", "password": DEMO_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a["message"], "Invalid credentials");
    assert_eq!(a["message"], b["message"]);
}

#[tokio::test]
async fn public_routes_need_no_token_and_protected_ones_do() {
    let server = TestServer::spawn().await;

    let res = server.get(DEMO_HOST, "/users").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get(DEMO_HOST, "/products").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.get(DEMO_HOST, "/products").bearer_auth("not-a-jwt").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.get(DEMO_HOST, "/tenant").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tenant: Value = res.json().await.unwrap();
    assert_eq!(tenant["slug"], "demo-store");
}

#[tokio::test]
async fn role_hierarchy_is_enforced_with_forbidden() {
    let server = TestServer::spawn().await;
    let customer = server.login(DEMO_HOST, "customer@demo-store.com").await;
    let admin = server.login(DEMO_HOST, "admin@demo-store.com").await;

    let res = server.get(DEMO_HOST, "/users/admin").bearer_auth(&customer).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // ADMIN dominates STAFF.
    let res = server.get(DEMO_HOST, "/users/staff").bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get(DEMO_HOST, "/users/super-admin").bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.get("anything.invalid", "/admin/tenants").bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn products_are_isolated_per_tenant() {
    let server = TestServer::spawn().await;
    let demo_admin = server.login(DEMO_HOST, "admin@demo-store.com").await;
    let test_admin = server.login(TEST_HOST, "admin@test-store.com").await;
    let demo_id = server.tenant_id("demo-store").await;

    // A forged tenantId in the payload is overridden by the bound tenant.
    let res = server
        .post(DEMO_HOST, "/products")
        .bearer_auth(&demo_admin)
        .json(&json!({ "name": "Demo Mug", "price": 12.5, "tenantId": "someone-else" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["tenantId"], demo_id.as_str());
    let product_id = created["id"].as_str().unwrap().to_string();

    let listed: Vec<Value> = server
        .get(TEST_HOST, "/products")
        .bearer_auth(&test_admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());

    let res = server
        .get(TEST_HOST, &format!("/products/{product_id}"))
        .bearer_auth(&test_admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server
        .delete(TEST_HOST, &format!("/products/{product_id}"))
        .bearer_auth(&test_admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Reusing another tenant's id on create neither conflicts nor collides.
    let res = server
        .post(TEST_HOST, "/products")
        .bearer_auth(&test_admin)
        .json(&json!({ "id": product_id, "name": "Test Mug", "price": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let copy: Value = res.json().await.unwrap();
    assert_ne!(copy["id"], product_id.as_str());

    let res = server
        .get(DEMO_HOST, &format!("/products/{product_id}"))
        .bearer_auth(&demo_admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn bulk_create_and_stats_stay_within_the_tenant() {
    let server = TestServer::spawn().await;
    let staff = server.login(DEMO_HOST, "staff@demo-store.com").await;
    let test_admin = server.login(TEST_HOST, "admin@test-store.com").await;

    let res = server
        .post(DEMO_HOST, "/products/bulk")
        .bearer_auth(&staff)
        .json(&json!({ "items": [
            { "name": "A", "price": 10, "category": "mugs" },
            { "name": "B", "price": 20, "category": "mugs" },
            { "name": "C", "price": 30, "category": "shirts" },
        ]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 3);

    server
        .post(TEST_HOST, "/products")
        .bearer_auth(&test_admin)
        .json(&json!({ "name": "Elsewhere", "price": 1000, "category": "mugs" }))
        .send()
        .await
        .unwrap();

    let stats: Value = server
        .get(DEMO_HOST, "/products/stats")
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["price"]["sum"], 60.0);
    assert_eq!(stats["price"]["max"], 30.0);
    assert_eq!(stats["byCategory"].as_array().unwrap().len(), 2);

    // Invalid item rejects the whole batch.
    let res = server
        .post(DEMO_HOST, "/products/bulk")
        .bearer_auth(&staff)
        .json(&json!({ "items": [{ "name": "ok" }, { "price": 1 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let mugs: Vec<Value> = server
        .get(DEMO_HOST, "/products?category=mugs")
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mugs.len(), 2);
}

#[tokio::test]
async fn staff_cannot_delete_but_admin_can() {
    let server = TestServer::spawn().await;
    let staff = server.login(DEMO_HOST, "staff@demo-store.com").await;
    let admin = server.login(DEMO_HOST, "admin@demo-store.com").await;

    let created: Value = server
        .post(DEMO_HOST, "/products")
        .bearer_auth(&staff)
        .json(&json!({ "name": "Lamp", "price": 5 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let path = format!("/products/{}", created["id"].as_str().unwrap());

    let res = server
        .put(DEMO_HOST, &path)
        .bearer_auth(&staff)
        .json(&json!({ "price": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["price"], 7);
    assert_eq!(updated["name"], "Lamp");

    let res = server.delete(DEMO_HOST, &path).bearer_auth(&staff).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.delete(DEMO_HOST, &path).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get(DEMO_HOST, &path).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn token_from_another_tenant_is_forbidden() {
    let server = TestServer::spawn().await;
    let demo_admin = server.login(DEMO_HOST, "admin@demo-store.com").await;

    let res = server.get(TEST_HOST, "/products").bearer_auth(&demo_admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn suspension_takes_effect_on_the_next_request() {
    let server = TestServer::spawn().await;
    let test_id = server.tenant_id("test-store").await;
    let super_admin = server.login("localhost", "superadmin@storefront-processor.com").await;
    let customer = server.login(TEST_HOST, "customer@test-store.com").await;

    let res = server.get(TEST_HOST, "/products").bearer_auth(&customer).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .put("anything.invalid", &format!("/admin/tenants/{test_id}/status"))
        .bearer_auth(&super_admin)
        .json(&json!({ "status": "SUSPENDED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tenant: Value = res.json().await.unwrap();
    assert_eq!(tenant["status"], "SUSPENDED");

    let res = server.get(TEST_HOST, "/products").bearer_auth(&customer).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Tenant is not active. Status: SUSPENDED");
}

#[tokio::test]
async fn admin_tenant_crud() {
    let server = TestServer::spawn().await;
    let super_admin = server.login("localhost", "superadmin@storefront-processor.com").await;

    let res = server
        .post("anything.invalid", "/admin/tenants")
        .bearer_auth(&super_admin)
        .json(&json!({
            "name": "New Shop",
            "slug": "new-shop",
            "domains": [{ "domain": "New-Shop.Test", "isPrimary": true }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // The new hostname resolves immediately.
    let res = server.get("new-shop.test", "/tenant").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .post("anything.invalid", "/admin/tenants")
        .bearer_auth(&super_admin)
        .json(&json!({ "name": "Dup", "slug": "dup", "domains": [{ "domain": "new-shop.test" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server
        .get("anything.invalid", "/admin/tenants/not-a-uuid")
        .bearer_auth(&super_admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .delete("anything.invalid", &format!("/admin/tenants/{id}"))
        .bearer_auth(&super_admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .get("anything.invalid", &format!("/admin/tenants/{id}"))
        .bearer_auth(&super_admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = server.get("new-shop.test", "/tenant").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tokens_for_missing_users_or_outside_their_window_are_rejected() {
    let server = TestServer::spawn().await;

    let ghost = mint_jwt(UserId::new(), Role::Admin, None, Utc::now());
    let res = server.get(DEMO_HOST, "/users/profile").bearer_auth(&ghost).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token");

    let expired = mint_jwt(UserId::new(), Role::Admin, None, Utc::now() - ChronoDuration::hours(2));
    let res = server.get(DEMO_HOST, "/users/profile").bearer_auth(&expired).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn concurrent_requests_never_see_each_others_tenant() {
    let server = std::sync::Arc::new(TestServer::spawn().await);
    let demo_admin = server.login(DEMO_HOST, "admin@demo-store.com").await;
    let test_admin = server.login(TEST_HOST, "admin@test-store.com").await;
    let demo_id = server.tenant_id("demo-store").await;
    let test_id = server.tenant_id("test-store").await;

    for (host, token) in [(DEMO_HOST, &demo_admin), (TEST_HOST, &test_admin)] {
        server
            .post(host, "/products")
            .bearer_auth(token)
            .json(&json!({ "name": format!("only on {host}"), "price": 1 }))
            .send()
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for i in 0..40 {
        let server = std::sync::Arc::clone(&server);
        let (host, token, expected) = if i % 2 == 0 {
            (DEMO_HOST, demo_admin.clone(), demo_id.clone())
        } else {
            (TEST_HOST, test_admin.clone(), test_id.clone())
        };
        tasks.push(tokio::spawn(async move {
            let products: Vec<Value> = server
                .get(host, "/products")
                .bearer_auth(&token)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(products.len(), 1);
            assert!(products.iter().all(|p| p["tenantId"] == expected.as_str()));
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}
