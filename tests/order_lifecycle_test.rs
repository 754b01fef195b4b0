mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use dulce_bocatto::entities::sabor;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, QueryOrder};
use serde_json::json;

#[tokio::test]
async fn local_order_is_priced_from_the_configured_cookie_price() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Ana Pérez", "ana@example.com").await;
    let sabor_id = app.first_flavor_id().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "sabor_id": sabor_id, "cantidad": 3, "metodo_envio": "local" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["estado"], "PENDIENTE");
    assert_eq!(decimal(&body["data"]["total"]), dec!(30));
    assert_eq!(decimal(&body["data"]["costo_envio"]), dec!(0));
    assert!(body["data"]["direccion_entrega"].is_null());
}

#[tokio::test]
async fn delivery_order_adds_shipping_and_falls_back_to_customer_address() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Luis", "luis@example.com").await;
    let sabor_id = app.first_flavor_id().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "sabor_id": sabor_id, "cantidad": 2, "metodo_envio": "delivery" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(decimal(&body["data"]["total"]), dec!(25));
    assert_eq!(decimal(&body["data"]["costo_envio"]), dec!(5));
    assert_eq!(body["data"]["direccion_entrega"], "Dirección por defecto");
}

#[tokio::test]
async fn quantity_is_clamped_into_range() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Eva", "eva@example.com").await;

    let low = app.place_order(&token, 0).await;
    let high = app.place_order(&token, 1_000).await;

    let (_, low_detail) = app
        .call(Method::GET, &format!("/api/v1/orders/{low}"), None, Some(&token))
        .await;
    assert_eq!(low_detail["data"]["lineas"][0]["cantidad"], 1);

    let (_, high_detail) = app
        .call(Method::GET, &format!("/api/v1/orders/{high}"), None, Some(&token))
        .await;
    assert_eq!(high_detail["data"]["lineas"][0]["cantidad"], 99);
    assert_eq!(decimal(&high_detail["data"]["pedido"]["total"]), dec!(990));
}

#[tokio::test]
async fn inactive_flavor_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Rosa", "rosa@example.com").await;
    let sabor_id = app.first_flavor_id().await;

    let (status, _) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/flavors/{sabor_id}"),
            Some(json!({ "nombre": "Chispas de chocolate", "activo": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "sabor_id": sabor_id, "cantidad": 1, "metodo_envio": "local" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_detail_is_hidden_from_other_customers() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let (_, stranger) = app.register_customer("Beto", "beto@example.com").await;
    let id = app.place_order(&owner, 2).await;
    let uri = format!("/api/v1/orders/{id}");

    let (status, body) = app.call(Method::GET, &uri, None, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["es_duenio"], true);
    assert_eq!(body["data"]["puede_editar"], true);
    assert_eq!(decimal(&body["data"]["saldo"]), dec!(20));

    let (status, _) = app.call(Method::GET, &uri, None, Some(&stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.as_admin(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["es_duenio"], false);
    assert_eq!(body["data"]["cliente_nombre"], "Ana");

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn replacing_items_recomputes_the_total() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let (_, stranger) = app.register_customer("Beto", "beto@example.com").await;
    let id = app.place_order(&owner, 2).await;

    let flavors = sabor::Entity::find()
        .order_by_asc(sabor::Column::Id)
        .all(&*app.state.db)
        .await
        .unwrap();
    let producto_id = app.seed.producto_id;
    let items = json!({
        "items": [
            { "producto_id": producto_id, "sabor_id": flavors[0].id, "cantidad": 4, "precio_unitario": "10.00" },
            { "producto_id": producto_id, "sabor_id": flavors[1].id, "cantidad": 2, "precio_unitario": "12.50" }
        ]
    });
    let uri = format!("/api/v1/orders/{id}/items");

    let (status, _) = app
        .call(Method::PUT, &uri, Some(items.clone()), Some(&stranger))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::PUT, &uri, Some(items), Some(&owner)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["lineas"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&body["data"]["pedido"]["total"]), dec!(65));

    let (status, _) = app
        .call(Method::PUT, &uri, Some(json!({ "items": [] })), Some(&owner))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.state.services.orders.verify_total(id).await.unwrap());
}

#[tokio::test]
async fn owner_confirms_once_and_cannot_cancel_afterwards() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let (_, stranger) = app.register_customer("Beto", "beto@example.com").await;
    let id = app.place_order(&owner, 1).await;

    let confirm = format!("/api/v1/orders/{id}/confirm");
    let (status, _) = app.call(Method::POST, &confirm, None, Some(&stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::POST, &confirm, None, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["estado"], "CONFIRMADO");

    let (status, _) = app.call(Method::POST, &confirm, None, Some(&owner)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(Method::POST, &format!("/api/v1/orders/{id}/cancel"), None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancelled_orders_are_frozen() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 1).await;

    let (status, body) = app
        .call(Method::POST, &format!("/api/v1/orders/{id}/cancel"), None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["estado"], "CANCELADO");

    let (_, detail) = app
        .call(Method::GET, &format!("/api/v1/orders/{id}"), None, Some(&owner))
        .await;
    assert_eq!(detail["data"]["puede_editar"], false);

    let (status, _) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/orders/{id}/status"),
            Some(json!({ "estado": "CONFIRMADO" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_and_confirmed_listings_split_by_status() {
    let app = TestApp::new().await;
    let (_, ana) = app.register_customer("Ana", "ana@example.com").await;
    let (_, beto) = app.register_customer("Beto", "beto@example.com").await;
    let pending = app.place_order(&ana, 1).await;
    let ana_confirmed = app.place_order(&ana, 2).await;
    let beto_confirmed = app.place_order(&beto, 3).await;
    for (id, token) in [(ana_confirmed, &ana), (beto_confirmed, &beto)] {
        let (status, _) = app
            .call(Method::POST, &format!("/api/v1/orders/{id}/confirm"), None, Some(token))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.as_admin(Method::GET, "/api/v1/orders/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![pending as i64]);

    let (status, _) = app
        .call(Method::GET, "/api/v1/orders/pending", None, Some(&ana))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, mine) = app
        .call(Method::GET, "/api/v1/orders/confirmed", None, Some(&ana))
        .await;
    assert_eq!(mine["data"]["total"], 1);
    assert_eq!(mine["data"]["items"][0]["id"], ana_confirmed);

    let (_, all) = app.as_admin(Method::GET, "/api/v1/orders/confirmed", None).await;
    assert_eq!(all["data"]["total"], 2);

    let (_, by_name) = app
        .as_admin(Method::GET, "/api/v1/orders/confirmed?q=beto", None)
        .await;
    assert_eq!(by_name["data"]["total"], 1);
    assert_eq!(by_name["data"]["items"][0]["id"], beto_confirmed);

    let (_, by_id) = app
        .as_admin(
            Method::GET,
            &format!("/api/v1/orders/confirmed?q={ana_confirmed}"),
            None,
        )
        .await;
    assert_eq!(by_id["data"]["items"][0]["cliente_nombre"], "Ana");
}

#[tokio::test]
async fn staff_walk_an_order_to_delivery_and_the_owner_rates_it() {
    let app = TestApp::new().await;
    let (_, owner) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&owner, 2).await;
    let status_uri = format!("/api/v1/orders/{id}/status");
    let rating_uri = format!("/api/v1/orders/{id}/rating");

    app.call(Method::POST, &format!("/api/v1/orders/{id}/confirm"), None, Some(&owner))
        .await;

    let (status, _) = app
        .as_admin(Method::PUT, &status_uri, Some(json!({ "estado": "ENTREGADO" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            &rating_uri,
            Some(json!({ "puntaje": 5 })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for estado in ["LISTO_ENTREGA", "ENTREGADO"] {
        let (status, body) = app
            .as_admin(Method::PUT, &status_uri, Some(json!({ "estado": estado })))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["estado"], estado);
    }

    let (status, body) = app
        .call(
            Method::POST,
            &rating_uri,
            Some(json!({ "puntaje": 4, "comentario": "Muy ricas" })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["puntaje"], 4);

    let (status, _) = app
        .call(Method::POST, &rating_uri, Some(json!({ "puntaje": 3 })), Some(&owner))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, rating) = app.call(Method::GET, &rating_uri, None, Some(&owner)).await;
    assert_eq!(rating["data"]["comentario"], "Muy ricas");
}
