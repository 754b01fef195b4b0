mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{decimal, TestApp};
use dulce_bocatto::{entities::pago, services::checkout::StripeCheckoutClient};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set, SqlErr};
use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SECRET: &str = "sk_test_dulce";

async fn app_with_provider(server: &MockServer) -> TestApp {
    let client = StripeCheckoutClient::new(server.uri(), SECRET).expect("checkout client");
    TestApp::with_gateway(Arc::new(client)).await
}

#[tokio::test]
async fn partial_cash_payment_leaves_a_balance() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let (_, stranger) = app.register_customer("Beto", "beto@example.com").await;
    let id = app.place_order(&owner, 3).await;
    let uri = format!("/api/v1/orders/{id}/payments");

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "metodo": "EFECTIVO", "monto": "12.00", "referencia": "  " })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["pagado_completo"], false);
    assert_eq!(decimal(&body["data"]["resumen"]["saldo"]), dec!(18));
    assert!(body["data"]["pago"]["referencia"].is_null());

    let (status, _) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "metodo": "QR", "monto": "5.00" })),
            Some(&stranger),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "metodo": "QR", "monto": "0" })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "metodo": "TRANSFERENCIA", "monto": "18.00", "referencia": "TRX-77" })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["pagado_completo"], true);
    assert_eq!(body["data"]["mensaje"], "Pedido pagado por completo");

    let (_, pagos) = app.call(Method::GET, &uri, None, Some(&owner)).await;
    let pagos = pagos["data"].as_array().unwrap();
    assert_eq!(pagos.len(), 2);
    assert_eq!(pagos[0]["metodo"], "EFECTIVO");
    assert_eq!(pagos[1]["referencia"], "TRX-77");

    let (_, detail) = app
        .call(Method::GET, &format!("/api/v1/orders/{id}"), None, Some(&owner))
        .await;
    assert_eq!(decimal(&detail["data"]["saldo"]), dec!(0));
    assert_eq!(detail["data"]["puede_editar"], false);
}

#[tokio::test]
async fn cashier_with_payment_permission_collects_for_any_order() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let cashier = app.employee_with("caja@dulcebocatto.bo", &["PAGO_WRITE"]).await;
    let id = app.place_order(&owner, 1).await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{id}/payments"),
            Some(json!({ "metodo": "EFECTIVO", "monto": 10 })),
            Some(&cashier),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["pagado_completo"], true);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/v1/orders/{id}/payments/summary"),
            None,
            Some(&cashier),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = app
        .as_admin(Method::GET, &format!("/api/v1/orders/{id}/payments/summary"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&summary["data"]["total_pagado"]), dec!(10));
}

#[tokio::test]
async fn cancelled_orders_take_no_payments() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 1).await;
    app.call(Method::POST, &format!("/api/v1/orders/{id}/cancel"), None, Some(&owner))
        .await;

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{id}/payments"),
            Some(json!({ "metodo": "EFECTIVO", "monto": "10.00" })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_without_a_provider_is_a_gateway_error() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 1).await;

    let (status, _) = app
        .call(Method::POST, &format!("/api/v1/orders/{id}/checkout"), None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn checkout_charges_the_pending_balance_and_records_once() {
    let server = MockServer::start().await;
    let app = app_with_provider(&server).await;
    let (usuario_id, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 2).await;

    app.call(
        Method::POST,
        &format!("/api/v1/orders/{id}/payments"),
        Some(json!({ "metodo": "EFECTIVO", "monto": "5.00" })),
        Some(&owner),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", format!("Bearer {SECRET}").as_str()))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("unit_amount%5D=1500"))
        .and(body_string_contains(format!("metadata%5Bpedido_id%5D={id}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.test/c/cs_test_1",
            "payment_status": "unpaid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "amount_total": 1500,
            "metadata": { "pedido_id": id.to_string(), "user_id": usuario_id.to_string() }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = app
        .call(Method::POST, &format!("/api/v1/orders/{id}/checkout"), None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["session_id"], "cs_test_1");
    assert_eq!(body["data"]["amount_cents"], 1500);
    assert_eq!(body["data"]["currency"], "usd");

    let success = format!("/api/v1/orders/{id}/checkout/success?session_id=cs_test_1");
    let (status, body) = app.call(Method::GET, &success, None, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["resultado"], "RECORDED");
    assert_eq!(decimal(&body["data"]["monto"]), dec!(15));

    let (status, body) = app.call(Method::GET, &success, None, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resultado"], "ALREADY_RECORDED");

    let (_, pagos) = app
        .call(Method::GET, &format!("/api/v1/orders/{id}/payments"), None, Some(&owner))
        .await;
    let pagos = pagos["data"].as_array().unwrap();
    assert_eq!(pagos.len(), 2);
    assert_eq!(pagos[1]["metodo"], "STRIPE");
    assert_eq!(pagos[1]["referencia"], "cs_test_1");
    assert_eq!(pagos[1]["registrado_por_id"], usuario_id);

    let (status, _) = app
        .call(Method::POST, &format!("/api/v1/orders/{id}/checkout"), None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unpaid_or_foreign_sessions_record_nothing() {
    let server = MockServer::start().await;
    let app = app_with_provider(&server).await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_open",
            "payment_status": "unpaid",
            "metadata": { "pedido_id": id.to_string() }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_other"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_other",
            "payment_status": "paid",
            "amount_total": 1000,
            "metadata": { "pedido_id": (id + 100).to_string() }
        })))
        .mount(&server)
        .await;

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/v1/orders/{id}/checkout/success?session_id=cs_open"),
            None,
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resultado"], "NOT_PAID");
    assert_eq!(body["data"]["payment_status"], "unpaid");

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/v1/orders/{id}/checkout/success?session_id=cs_other"),
            None,
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/v1/orders/{id}/checkout/cancel"),
            None,
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["total_pagado"]), dec!(0));
    assert_eq!(decimal(&body["data"]["saldo"]), dec!(10));
}

#[tokio::test]
async fn provider_errors_surface_as_bad_gateway() {
    let server = MockServer::start().await;
    let app = app_with_provider(&server).await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 1).await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": { "message": "card declined" }
        })))
        .mount(&server)
        .await;

    let (status, body) = app
        .call(Method::POST, &format!("/api/v1/orders/{id}/checkout"), None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"].as_str().unwrap().contains("402"));
}

#[tokio::test]
async fn sub_cent_amounts_are_rejected_without_recording() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 1).await;
    let uri = format!("/api/v1/orders/{id}/payments");

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "metodo": "QR", "monto": "0.001" })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, pagos) = app.call(Method::GET, &uri, None, Some(&owner)).await;
    assert!(pagos["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn a_checkout_session_backs_at_most_one_payment() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 2).await;
    let db = &*app.state.db;

    let row = |metodo: &str, referencia: &str| pago::ActiveModel {
        pedido_id: Set(id),
        metodo: Set(metodo.to_string()),
        monto: Set(dec!(5.00)),
        referencia: Set(Some(referencia.to_string())),
        registrado_por_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    row("STRIPE", "cs_test_dup").insert(db).await.unwrap();
    let err = row("STRIPE", "cs_test_dup").insert(db).await.unwrap_err();
    assert_matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)));

    row("EFECTIVO", "REC-1").insert(db).await.unwrap();
    row("EFECTIVO", "REC-1").insert(db).await.unwrap();
}
