mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp, ADMIN_EMAIL, PASSWORD};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn names(rows: &Value, field: &str) -> Vec<String> {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|r| r[field].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn registration_rejects_duplicates_and_weak_passwords() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "nombre": "Ana", "email": "  Ana@Example.com ", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["email"], "ana@example.com");
    assert_eq!(body["data"]["es_staff"], false);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "nombre": "Ana bis", "email": "ana@example.com", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "nombre": "Beto", "email": "beto@example.com", "password": "corta" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "ana@example.com", "password": "equivocada" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn profile_updates_reach_the_customer_record() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Ana", "ana@example.com").await;

    let (status, me) = app
        .call(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["usuario"]["nombre"], "Ana");
    assert!(me["data"]["roles"].as_array().unwrap().is_empty());
    assert!(me["data"]["permisos"].as_array().unwrap().is_empty());

    let (status, me) = app
        .call(
            Method::PUT,
            "/api/v1/auth/me",
            Some(json!({ "nombre": "Ana Pérez", "telefono": "70000001", "direccion": "Calle 21, Calacoto" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["data"]["usuario"]["telefono"], "70000001");
    assert_eq!(me["data"]["direccion"], "Calle 21, Calacoto");

    let (status, profile) = app
        .call(Method::GET, "/api/v1/customers/me", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["data"]["cliente"]["nombre"], "Ana Pérez");
    assert_eq!(profile["data"]["cliente"]["direccion"], "Calle 21, Calacoto");
    assert!(profile["data"]["pedidos"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn staff_see_the_whole_permission_catalogue() {
    let app = TestApp::new().await;
    let (status, me) = app.as_admin(Method::GET, "/api/v1/auth/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["usuario"]["email"], ADMIN_EMAIL);
    assert_eq!(me["data"]["usuario"]["es_staff"], true);
    let permisos = me["data"]["permisos"].as_array().unwrap();
    assert_eq!(permisos.len(), 16);
    assert!(permisos.iter().any(|p| p == "ROL_ADMIN"));
}

#[tokio::test]
async fn password_change_and_logout() {
    let app = TestApp::new().await;
    let (_, token) = app.register_customer("Ana", "ana@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/auth/password",
            Some(json!({ "current_password": "no-es-esta", "new_password": "galletas-nuevas" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/password",
            Some(json!({ "current_password": PASSWORD, "new_password": "galletas-nuevas" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "ana@example.com", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "ana@example.com", "password": "galletas-nuevas" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(Method::POST, "/api/v1/auth/logout", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn roles_are_managed_and_guarded_while_in_use() {
    let app = TestApp::new().await;
    let (status, permisos) = app
        .as_admin(Method::GET, "/api/v1/admin/permissions", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let permisos = permisos["data"].as_array().unwrap();
    assert_eq!(permisos.len(), 16);
    let mut ids: Vec<i64> = permisos.iter().map(|p| p["id"].as_i64().unwrap()).collect();
    ids.sort_unstable();
    let (first, second) = (ids[0], ids[1]);

    let (status, role) = app
        .as_admin(
            Method::POST,
            "/api/v1/admin/roles",
            Some(json!({ "nombre": "Cocina", "permisos": [second, first, first] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{role}");
    let rol_id = role["data"]["id"].as_i64().unwrap();
    assert_eq!(role["data"]["permisos"], json!([first, second]));

    let (status, _) = app
        .as_admin(
            Method::POST,
            "/api/v1/admin/roles",
            Some(json!({ "nombre": "Cocina", "permisos": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .as_admin(
            Method::POST,
            "/api/v1/admin/roles",
            Some(json!({ "nombre": "Fantasma", "permisos": [9999] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/admin/roles/{rol_id}"),
            Some(json!({ "nombre": "Cocina central", "permisos": [first] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["nombre"], "Cocina central");
    assert_eq!(updated["data"]["permisos"], json!([first]));

    let (usuario_id, _) = app.register_customer("Carla", "carla@example.com").await;
    let (status, assigned) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/admin/users/{usuario_id}/roles"),
            Some(json!({ "roles": [rol_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["data"], json!({ "ok": true, "roles": [rol_id] }));

    let (status, _) = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/admin/users/{usuario_id}/roles"),
            Some(json!({ "roles": [9999] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, users) = app.as_admin(Method::GET, "/api/v1/admin/users", None).await;
    let carla = users["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "carla@example.com")
        .cloned()
        .unwrap();
    assert_eq!(carla["roles"], json!([rol_id]));

    let role_uri = format!("/api/v1/admin/roles/{rol_id}");
    let (status, _) = app.as_admin(Method::DELETE, &role_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.as_admin(
        Method::PUT,
        &format!("/api/v1/admin/users/{usuario_id}/roles"),
        Some(json!({ "roles": [] })),
    )
    .await;
    let (status, _) = app.as_admin(Method::DELETE, &role_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.as_admin(Method::GET, &role_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_need_role_administration() {
    let app = TestApp::new().await;
    let reporter = app
        .employee_with("reportes@dulcebocatto.bo", &["REPORTE_READ"])
        .await;

    let (status, _) = app
        .call(Method::GET, "/api/v1/admin/roles", None, Some(&reporter))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(Method::GET, "/api/v1/audit", None, Some(&reporter))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(Method::GET, "/api/v1/reports/status-summary", None, Some(&reporter))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::GET, "/api/v1/admin/roles", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reports_cover_confirmed_orders_and_every_status() {
    let app = TestApp::new().await;
    let (_, ana) = app.register_customer("Ana", "ana@example.com").await;
    let (_, beto) = app.register_customer("Beto", "beto@example.com").await;

    let small = app.place_order(&ana, 1).await;
    let large = app.place_order(&beto, 4).await;
    let pending = app.place_order(&beto, 2).await;
    for (id, token) in [(small, &ana), (large, &beto)] {
        let (status, _) = app
            .call(Method::POST, &format!("/api/v1/orders/{id}/confirm"), None, Some(token))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    app.call(
        Method::POST,
        &format!("/api/v1/orders/{large}/payments"),
        Some(json!({ "metodo": "QR", "monto": "15.00" })),
        Some(&beto),
    )
    .await;

    let (status, history) = app
        .as_admin(
            Method::GET,
            "/api/v1/reports/customer-history?sort=total&dir=desc",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{history}");
    assert_eq!(history["data"]["cantidad"], 2);
    assert_eq!(decimal(&history["data"]["suma_total"]), dec!(50));
    let filas = &history["data"]["filas"];
    assert_eq!(filas[0]["pedido_id"], large);
    assert_eq!(filas[0]["cliente"], "Beto");
    assert_eq!(filas[0]["email"], "beto@example.com");
    assert_eq!(decimal(&filas[0]["pagado"]), dec!(15));
    assert_eq!(filas[1]["pedido_id"], small);
    assert!(filas
        .as_array()
        .unwrap()
        .iter()
        .all(|f| f["pedido_id"] != pending));

    let (_, filtered) = app
        .as_admin(Method::GET, "/api/v1/reports/customer-history?q=ANA", None)
        .await;
    assert_eq!(filtered["data"]["cantidad"], 1);
    assert_eq!(filtered["data"]["filas"][0]["pedido_id"], small);

    let (status, summary) = app
        .as_admin(Method::GET, "/api/v1/reports/status-summary", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let summary = summary["data"].as_array().unwrap();
    assert_eq!(summary.len(), 6);
    let bucket = |estado: &str| {
        summary
            .iter()
            .find(|s| s["estado"] == estado)
            .cloned()
            .unwrap()
    };
    assert_eq!(bucket("CONFIRMADO")["cantidad"], 2);
    assert_eq!(decimal(&bucket("CONFIRMADO")["total"]), dec!(50));
    assert_eq!(bucket("PENDIENTE")["cantidad"], 1);
    assert_eq!(bucket("ENTREGADO")["cantidad"], 0);
    assert_eq!(decimal(&bucket("ENTREGADO")["total"]), dec!(0));
}

#[tokio::test]
async fn audit_trail_lists_newest_first() {
    let app = TestApp::new().await;
    let (usuario_id, token) = app.register_customer("Ana", "ana@example.com").await;
    let id = app.place_order(&token, 2).await;
    app.call(Method::POST, &format!("/api/v1/orders/{id}/confirm"), None, Some(&token))
        .await;

    let (status, page) = app
        .as_admin(Method::GET, "/api/v1/audit?entidad=Pedido", None)
        .await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["data"]["total"], 2);
    let items = page["data"]["items"].as_array().unwrap();
    assert_eq!(items[0]["accion"], "ACTUALIZAR");
    assert_eq!(items[1]["accion"], "CREAR");
    assert!(items.iter().all(|e| e["entidad_id"] == id));

    let (_, mine) = app
        .as_admin(Method::GET, &format!("/api/v1/audit?usuario_id={usuario_id}"), None)
        .await;
    let acciones = names(&mine["data"]["items"], "accion");
    assert!(acciones.iter().any(|a| a == "LOGIN"));
    assert!(acciones.iter().any(|a| a == "CREAR"));
}

#[tokio::test]
async fn public_catalog_and_health_checks() {
    let app = TestApp::new().await;

    let (status, catalog) = app.call(Method::GET, "/api/v1/catalog", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(catalog["data"]["sabores"].as_array().unwrap().len(), 4);
    assert_eq!(decimal(&catalog["data"]["precio_unitario"]), dec!(10));

    let (status, health) = app.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "up");
    assert_eq!(health["details"]["checkout"]["status"], "disabled");

    let (status, info) = app.call(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["service"], "dulce-bocatto");
    assert_eq!(info["checkout_enabled"], false);

    let (status, live) = app.call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["status"], "up");

    let (status, doc) = app.call(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/orders"].is_object());
}
