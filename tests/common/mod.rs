#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use dulce_bocatto::{
    app_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{permiso, sabor, usuario},
    seed::{seed_defaults, SeedOptions, SeedReport},
    services::checkout::CheckoutGateway,
    AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@dulcebocatto.bo";
pub const PASSWORD: &str = "horno-caliente-2024";

/// Application wired to a fresh in-memory SQLite database with the default seed applied.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub seed: SeedReport,
    admin_token: String,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "test_secret_key_for_dulce_bocatto_only_32chars".to_string(),
        3600,
        "127.0.0.1".to_string(),
        18_080,
        "development".to_string(),
    );
    cfg.cookie_unit_price = dec!(10.00);
    cfg.delivery_shipping_cost = dec!(5.00);
    cfg.site_url = "http://localhost:3000".to_string();
    cfg
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_gateway(gateway: Arc<dyn CheckoutGateway>) -> Self {
        Self::build(Some(gateway)).await
    }

    async fn build(gateway: Option<Arc<dyn CheckoutGateway>>) -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::sqlite_in_memory())
            .await
            .expect("in-memory sqlite");
        db::run_migrations(&pool).await.expect("migrations");

        let cfg = test_config();
        let seed = seed_defaults(
            &pool,
            &SeedOptions {
                admin_email: ADMIN_EMAIL.to_string(),
                admin_password: PASSWORD.to_string(),
                admin_name: "Administración".to_string(),
                cookie_unit_price: cfg.cookie_unit_price,
            },
        )
        .await
        .expect("seed");

        let state = AppState::new(Arc::new(pool), cfg, gateway);
        let admin = usuario::Entity::find_by_id(seed.usuario_admin_id)
            .one(&*state.db)
            .await
            .expect("admin lookup")
            .expect("admin exists");
        let admin_token = state
            .auth
            .generate_token(&admin)
            .expect("admin token")
            .access_token;

        Self {
            router: app_router(state.clone()),
            state,
            seed,
            admin_token,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Status plus parsed JSON body (Null for empty bodies)
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.admin_token.clone();
        self.call(method, uri, body, Some(&token)).await
    }

    /// Registers a customer through the API and logs in. Returns (usuario id, token).
    pub async fn register_customer(&self, nombre: &str, email: &str) -> (i32, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({ "nombre": nombre, "email": email, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        self.login(email).await
    }

    pub async fn login(&self, email: &str) -> (i32, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        let id = body["data"]["usuario"]["id"].as_i64().expect("usuario id") as i32;
        let token = body["data"]["token"]["access_token"]
            .as_str()
            .expect("access token")
            .to_string();
        (id, token)
    }

    /// Non-staff account holding a role with exactly `codes`
    pub async fn employee_with(&self, email: &str, codes: &[&str]) -> String {
        let permisos: Vec<i32> = permiso::Entity::find()
            .filter(permiso::Column::Codigo.is_in(codes.iter().copied()))
            .all(&*self.state.db)
            .await
            .expect("permission lookup")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(permisos.len(), codes.len(), "unknown permission code");

        let (status, role) = self
            .as_admin(
                Method::POST,
                "/api/v1/admin/roles",
                Some(json!({ "nombre": format!("Rol {email}"), "permisos": permisos })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "role creation failed: {role}");
        let rol_id = role["data"]["id"].as_i64().expect("role id");

        let (usuario_id, _) = self.register_customer("Empleado", email).await;
        let (status, body) = self
            .as_admin(
                Method::PUT,
                &format!("/api/v1/admin/users/{usuario_id}/roles"),
                Some(json!({ "roles": [rol_id] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "role assignment failed: {body}");
        self.login(email).await.1
    }

    pub async fn first_flavor_id(&self) -> i32 {
        sabor::Entity::find()
            .order_by_asc(sabor::Column::Id)
            .one(&*self.state.db)
            .await
            .expect("flavor lookup")
            .expect("seeded flavor")
            .id
    }

    /// Places a local-pickup order and returns its id
    pub async fn place_order(&self, token: &str, cantidad: i32) -> i32 {
        let sabor_id = self.first_flavor_id().await;
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/orders",
                Some(json!({
                    "sabor_id": sabor_id,
                    "cantidad": cantidad,
                    "metodo_envio": "local"
                })),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "order creation failed: {body}");
        body["data"]["id"].as_i64().expect("order id") as i32
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

/// Decimal out of a JSON string or number, so scale differences never matter
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}
