mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn supplier(app: &TestApp, nombre: &str) -> i64 {
    let (status, body) = app
        .as_admin(
            Method::POST,
            "/api/v1/suppliers",
            Some(json!({ "nombre": nombre, "telefono": "  ", "direccion": "Zona Sur" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["data"]["telefono"].is_null());
    body["data"]["id"].as_i64().unwrap()
}

async fn ingredient(app: &TestApp, nombre: &str) -> i64 {
    let (_, body) = app
        .as_admin(
            Method::POST,
            "/api/v1/ingredients",
            Some(json!({ "nombre": nombre, "unidad_medida": "kg" })),
        )
        .await;
    body["data"]["id"].as_i64().unwrap()
}

async fn stock_of(app: &TestApp, insumo_id: i64) -> Value {
    app.as_admin(Method::GET, &format!("/api/v1/ingredients/{insumo_id}/stock"), None)
        .await
        .1
}

#[tokio::test]
async fn suppliers_are_listed_alphabetically_and_filtered_by_name() {
    let app = TestApp::new().await;
    for nombre in ["Molinos del Sur", "Lácteos Andinos", "Distribuidora Central"] {
        supplier(&app, nombre).await;
    }

    let (status, page) = app.as_admin(Method::GET, "/api/v1/suppliers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 3);
    let names: Vec<&str> = page["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["nombre"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["Distribuidora Central", "Lácteos Andinos", "Molinos del Sur"]
    );

    let (_, filtered) = app
        .as_admin(Method::GET, "/api/v1/suppliers?q=molinos", None)
        .await;
    assert_eq!(filtered["data"]["total"], 1);
    assert_eq!(filtered["data"]["items"][0]["nombre"], "Molinos del Sur");
}

#[tokio::test]
async fn supplier_updates_and_blank_names_are_rejected() {
    let app = TestApp::new().await;
    let id = supplier(&app, "Molinos").await;

    let (status, body) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/suppliers/{id}"),
            Some(json!({ "nombre": "Molinos SRL", "telefono": "2-2445566" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nombre"], "Molinos SRL");
    assert!(body["data"]["direccion"].is_null());

    let (status, _) = app
        .as_admin(
            Method::POST,
            "/api/v1/suppliers",
            Some(json!({ "nombre": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .as_admin(Method::GET, "/api/v1/suppliers/9999", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn receiving_a_purchase_books_stock_exactly_once() {
    let app = TestApp::new().await;
    let proveedor = supplier(&app, "Molinos del Sur").await;
    let harina = ingredient(&app, "Harina").await;
    let azucar = ingredient(&app, "Azucar").await;

    let (status, created) = app
        .as_admin(
            Method::POST,
            "/api/v1/purchases",
            Some(json!({
                "proveedor_id": proveedor,
                "lineas": [
                    { "insumo_id": harina, "cantidad": "10", "costo_unitario": "8.50" },
                    { "insumo_id": azucar, "cantidad": "2.5", "costo_unitario": "6.00" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(decimal(&created["data"]["compra"]["total"]), dec!(100));
    assert_eq!(created["data"]["compra"]["recepcionada"], false);
    assert_eq!(created["data"]["proveedor_nombre"], "Molinos del Sur");
    assert_eq!(created["data"]["lineas"][0]["insumo_nombre"], "Harina");
    assert_eq!(decimal(&created["data"]["lineas"][1]["subtotal"]), dec!(15));
    let compra_id = created["data"]["compra"]["id"].as_i64().unwrap();

    assert_eq!(decimal(&stock_of(&app, harina).await["data"]["stock"]), dec!(0));

    let receive = format!("/api/v1/purchases/{compra_id}/receive");
    let (status, received) = app.as_admin(Method::POST, &receive, None).await;
    assert_eq!(status, StatusCode::OK, "{received}");
    assert_eq!(received["data"]["compra"]["recepcionada"], true);
    assert!(!received["data"]["compra"]["fecha_recepcion"].is_null());

    assert_eq!(decimal(&stock_of(&app, harina).await["data"]["stock"]), dec!(10));
    assert_eq!(decimal(&stock_of(&app, azucar).await["data"]["stock"]), dec!(2.5));

    let (status, _) = app.as_admin(Method::POST, &receive, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(decimal(&stock_of(&app, harina).await["data"]["stock"]), dec!(10));

    let (_, kardex) = app
        .as_admin(Method::GET, &format!("/api/v1/kardex?insumo_id={harina}"), None)
        .await;
    assert_eq!(kardex["data"].as_array().unwrap().len(), 1);
    assert_eq!(kardex["data"][0]["observacion"], format!("COMPRA #{compra_id}"));

    let (_, pending) = app
        .as_admin(Method::GET, "/api/v1/purchases?recepcionada=false", None)
        .await;
    assert!(pending["data"].as_array().unwrap().is_empty());
    let (_, all) = app
        .as_admin(Method::GET, &format!("/api/v1/purchases?proveedor_id={proveedor}"), None)
        .await;
    assert_eq!(all["data"][0]["id"], compra_id);

    let (status, _) = app
        .as_admin(Method::DELETE, &format!("/api/v1/suppliers/{proveedor}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn purchases_validate_their_lines() {
    let app = TestApp::new().await;
    let proveedor = supplier(&app, "Molinos").await;
    let harina = ingredient(&app, "Harina").await;

    let cases = [
        json!({ "proveedor_id": proveedor, "lineas": [] }),
        json!({ "proveedor_id": proveedor, "lineas": [
            { "insumo_id": harina, "cantidad": "0", "costo_unitario": "1" }
        ] }),
        json!({ "proveedor_id": proveedor, "lineas": [
            { "insumo_id": harina, "cantidad": "0.0001", "costo_unitario": "1" }
        ] }),
        json!({ "proveedor_id": proveedor, "lineas": [
            { "insumo_id": harina, "cantidad": "1", "costo_unitario": "1" },
            { "insumo_id": harina, "cantidad": "2", "costo_unitario": "1" }
        ] }),
        json!({ "proveedor_id": proveedor, "lineas": [
            { "insumo_id": 9999, "cantidad": "1", "costo_unitario": "1" }
        ] }),
    ];
    for case in cases {
        let (status, body) = app
            .as_admin(Method::POST, "/api/v1/purchases", Some(case))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    let (status, _) = app
        .as_admin(
            Method::POST,
            "/api/v1/purchases",
            Some(json!({ "proveedor_id": 9999, "lineas": [
                { "insumo_id": harina, "cantidad": "1", "costo_unitario": "1" }
            ] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn buyers_need_purchase_permissions() {
    let app = TestApp::new().await;
    let viewer = app
        .employee_with("compras@dulcebocatto.bo", &["COMPRA_READ", "PROVEEDOR_READ"])
        .await;
    let proveedor = supplier(&app, "Molinos").await;

    let (status, _) = app
        .call(Method::GET, "/api/v1/purchases", None, Some(&viewer))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/suppliers/{proveedor}"), None, Some(&viewer))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/purchases",
            Some(json!({ "proveedor_id": proveedor, "lineas": [] })),
            Some(&viewer),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/suppliers/{proveedor}"),
            None,
            Some(&viewer),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
