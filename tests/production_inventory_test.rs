mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

async fn ingredient(app: &TestApp, nombre: &str, unidad: &str) -> i64 {
    let (status, body) = app
        .as_admin(
            Method::POST,
            "/api/v1/ingredients",
            Some(json!({ "nombre": nombre, "unidad_medida": unidad })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

async fn movement(app: &TestApp, insumo_id: i64, tipo: &str, motivo: &str, cantidad: &str) -> StatusCode {
    app.as_admin(
        Method::POST,
        &format!("/api/v1/ingredients/{insumo_id}/movements"),
        Some(json!({ "tipo": tipo, "motivo": motivo, "cantidad": cantidad })),
    )
    .await
    .0
}

async fn stock(app: &TestApp, insumo_id: i64) -> Decimal {
    let (status, body) = app
        .as_admin(Method::GET, &format!("/api/v1/ingredients/{insumo_id}/stock"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        decimal(&body["data"]["stock"]),
        decimal(&body["data"]["cantidad_disponible"])
    );
    decimal(&body["data"]["stock"])
}

/// Flour and butter on hand, and a cookie recipe using both
async fn stocked_kitchen(app: &TestApp) -> (i64, i64) {
    let harina = ingredient(app, "Harina", "kg").await;
    let mantequilla = ingredient(app, "Mantequilla", "kg").await;
    assert_eq!(movement(app, harina, "ENTRADA", "COMPRA", "2.5").await, StatusCode::CREATED);
    assert_eq!(movement(app, mantequilla, "ENTRADA", "COMPRA", "1").await, StatusCode::CREATED);

    let (status, recipe) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/recipes/{}", app.seed.producto_id),
            Some(json!({ "lineas": [
                { "insumo_id": harina, "cantidad": "0.25" },
                { "insumo_id": mantequilla, "cantidad": "0.125" }
            ] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{recipe}");
    assert_eq!(recipe["data"].as_array().unwrap().len(), 2);
    (harina, mantequilla)
}

async fn confirmed_order(app: &TestApp, cantidad: i32) -> i32 {
    let (_, token) = app
        .register_customer("Cliente", &format!("cliente{cantidad}@example.com"))
        .await;
    let id = app.place_order(&token, cantidad).await;
    let (status, _) = app
        .call(Method::POST, &format!("/api/v1/orders/{id}/confirm"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    id
}

#[tokio::test]
async fn ledger_drives_stock_and_refuses_overdraw() {
    let app = TestApp::new().await;
    let azucar = ingredient(&app, "Azucar", "kg").await;

    let (status, _) = app
        .as_admin(
            Method::POST,
            "/api/v1/ingredients",
            Some(json!({ "nombre": "AZUCAR", "unidad_medida": "kg" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(movement(&app, azucar, "ENTRADA", "COMPRA", "5").await, StatusCode::CREATED);
    assert_eq!(movement(&app, azucar, "SALIDA", "MERMA", "1.5").await, StatusCode::CREATED);
    assert_eq!(stock(&app, azucar).await, dec!(3.5));

    assert_eq!(
        movement(&app, azucar, "SALIDA", "AJUSTE", "4").await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        movement(&app, azucar, "ENTRADA", "AJUSTE", "0").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(stock(&app, azucar).await, dec!(3.5));

    let (status, kardex) = app
        .as_admin(Method::GET, &format!("/api/v1/kardex?insumo_id={azucar}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = kardex["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["tipo"], "SALIDA");
    assert_eq!(rows[0]["motivo"], "MERMA");

    let (status, _) = app
        .as_admin(Method::DELETE, &format!("/api/v1/ingredients/{azucar}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let unused = ingredient(&app, "Canela", "g").await;
    let (status, _) = app
        .as_admin(Method::DELETE, &format!("/api/v1/ingredients/{unused}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn ingredient_routes_need_inventory_permissions() {
    let app = TestApp::new().await;
    let (_, customer) = app.register_customer("Ana", "ana@example.com").await;
    let reader = app.employee_with("almacen@dulcebocatto.bo", &["INSUMO_READ"]).await;
    let harina = ingredient(&app, "Harina", "kg").await;

    let (status, _) = app
        .call(Method::GET, "/api/v1/ingredients", None, Some(&customer))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::GET, "/api/v1/ingredients", None, Some(&reader))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], harina);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/ingredients/{harina}/movements"),
            Some(json!({ "tipo": "ENTRADA", "motivo": "COMPRA", "cantidad": "1" })),
            Some(&reader),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn plan_reports_requirements_against_stock() {
    let app = TestApp::new().await;
    let (harina, _) = stocked_kitchen(&app).await;
    let small = confirmed_order(&app, 4).await;
    let large = confirmed_order(&app, 20).await;

    let (status, plan) = app
        .as_admin(Method::GET, &format!("/api/v1/production/orders/{small}/plan"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let line = &plan["data"]["lineas"][0];
    assert_eq!(line["ok"], true);
    let flour = line["insumos"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["insumo_id"] == harina)
        .unwrap();
    assert_eq!(decimal(&flour["requerido"]), dec!(1));
    assert_eq!(plan["data"]["listo_para_entrega"], false);

    let (_, plan) = app
        .as_admin(Method::GET, &format!("/api/v1/production/orders/{large}/plan"), None)
        .await;
    assert_eq!(plan["data"]["lineas"][0]["ok"], false);

    let (status, queue) = app.as_admin(Method::GET, "/api/v1/production/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = queue["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![small as i64, large as i64]);
}

#[tokio::test]
async fn producing_a_line_consumes_the_recipe_and_advances_the_order() {
    let app = TestApp::new().await;
    let (harina, mantequilla) = stocked_kitchen(&app).await;
    let id = confirmed_order(&app, 4).await;
    let sabor_id = app.first_flavor_id().await;
    let produce = format!(
        "/api/v1/production/orders/{id}/items/{}/{sabor_id}",
        app.seed.producto_id
    );
    let ready = format!("/api/v1/production/orders/{id}/ready");

    let (status, _) = app.as_admin(Method::POST, &ready, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, plan) = app.as_admin(Method::POST, &produce, None).await;
    assert_eq!(status, StatusCode::OK, "{plan}");
    assert_eq!(plan["data"]["estado"], "EN_PRODUCCION");
    assert_eq!(plan["data"]["lineas"][0]["producido"], true);
    assert_eq!(plan["data"]["listo_para_entrega"], true);

    assert_eq!(stock(&app, harina).await, dec!(1.5));
    assert_eq!(stock(&app, mantequilla).await, dec!(0.5));

    let (_, kardex) = app
        .as_admin(Method::GET, &format!("/api/v1/kardex?insumo_id={harina}"), None)
        .await;
    assert_eq!(kardex["data"][0]["motivo"], "PRODUCCION");
    assert_eq!(
        kardex["data"][0]["observacion"],
        format!("PRODUCCION PEDIDO #{id}")
    );

    let (status, _) = app.as_admin(Method::POST, &produce, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, order) = app.as_admin(Method::POST, &ready, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["data"]["estado"], "LISTO_ENTREGA");

    let (_, queue) = app.as_admin(Method::GET, "/api/v1/production/queue", None).await;
    assert!(queue["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn shortage_blocks_production_without_touching_stock() {
    let app = TestApp::new().await;
    let (harina, _) = stocked_kitchen(&app).await;
    let id = confirmed_order(&app, 20).await;
    let sabor_id = app.first_flavor_id().await;

    let (status, body) = app
        .as_admin(
            Method::POST,
            &format!(
                "/api/v1/production/orders/{id}/items/{}/{sabor_id}",
                app.seed.producto_id
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("Harina"));
    assert_eq!(stock(&app, harina).await, dec!(2.5));

    let (_, detail) = app
        .as_admin(Method::GET, &format!("/api/v1/orders/{id}"), None)
        .await;
    assert_eq!(detail["data"]["pedido"]["estado"], "CONFIRMADO");
}

#[tokio::test]
async fn pending_orders_cannot_be_produced() {
    let app = TestApp::new().await;
    stocked_kitchen(&app).await;
    let (_, token) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&token, 1).await;

    let (status, _) = app
        .as_admin(Method::POST, &format!("/api/v1/production/orders/{id}/start"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::GET, "/api/v1/production/queue", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delivery_orders_close_when_the_courier_delivers() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Ana", "ana@example.com").await;
    let sabor_id = app.first_flavor_id().await;
    let (_, created) = app
        .call(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "sabor_id": sabor_id,
                "cantidad": 2,
                "metodo_envio": "delivery",
                "direccion_entrega": "Av. Arce 123"
            })),
            Some(&token),
        )
        .await;
    let id = created["data"]["id"].as_i64().unwrap();
    let delivery = format!("/api/v1/orders/{id}/delivery");
    let courier = json!({ "nombre_repartidor": "Marco", "telefono_repartidor": "70011223" });

    app.call(Method::POST, &format!("/api/v1/orders/{id}/confirm"), None, Some(&token))
        .await;
    let (status, _) = app.as_admin(Method::POST, &delivery, Some(courier.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/orders/{id}/status"),
            Some(json!({ "estado": "LISTO_ENTREGA" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, envio) = app.as_admin(Method::POST, &delivery, Some(courier.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{envio}");
    assert_eq!(envio["data"]["estado"], "PENDIENTE");
    let (status, _) = app.as_admin(Method::POST, &delivery, Some(courier)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let status_uri = format!("/api/v1/orders/{id}/delivery/status");
    let (status, _) = app
        .as_admin(Method::PUT, &status_uri, Some(json!({ "estado": "EN_CAMINO" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .as_admin(Method::PUT, &status_uri, Some(json!({ "estado": "PENDIENTE" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .as_admin(Method::PUT, &status_uri, Some(json!({ "estado": "ENTREGADO" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = app
        .call(Method::GET, &format!("/api/v1/orders/{id}"), None, Some(&token))
        .await;
    assert_eq!(detail["data"]["pedido"]["estado"], "ENTREGADO");
    assert_eq!(detail["data"]["pedido"]["direccion_entrega"], "Av. Arce 123");
}

#[tokio::test]
async fn invoices_are_issued_once_for_confirmed_orders() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&token, 3).await;
    let uri = format!("/api/v1/orders/{id}/invoice");
    let input = json!({ "nit_cliente": "1234567", "razon_social": "Ana Pérez" });

    let (status, _) = app.as_admin(Method::POST, &uri, Some(input.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.call(Method::POST, &format!("/api/v1/orders/{id}/confirm"), None, Some(&token))
        .await;
    let (status, factura) = app.as_admin(Method::POST, &uri, Some(input.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{factura}");
    assert_eq!(decimal(&factura["data"]["total"]), dec!(30));
    let nro = factura["data"]["nro"].as_str().unwrap();
    assert!(nro.starts_with("F-"));
    assert!(nro.ends_with(&format!("-{id:06}")));

    let (status, _) = app.as_admin(Method::POST, &uri, Some(input)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, fetched) = app.as_admin(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["nro"], nro);
}

#[tokio::test]
async fn recipe_quantities_that_round_to_zero_are_rejected() {
    let app = TestApp::new().await;
    let harina = ingredient(&app, "Harina", "kg").await;
    let uri = format!("/api/v1/recipes/{}", app.seed.producto_id);

    let (status, body) = app
        .as_admin(
            Method::PUT,
            &uri,
            Some(json!({ "lineas": [{ "insumo_id": harina, "cantidad": "0.0004" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .as_admin(
            Method::PUT,
            &uri,
            Some(json!({ "lineas": [{ "insumo_id": harina, "cantidad": "0.0006" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(decimal(&body["data"][0]["cantidad"]).round_dp(3), dec!(0.001));
}
