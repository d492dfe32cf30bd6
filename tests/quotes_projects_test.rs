//! Quote pipeline, project creation from won quotes and the stage workflow.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn create_quote(app: &TestApp, customer_id: &str, body: Value) -> Value {
    let mut body = body;
    body["customer_id"] = json!(customer_id);
    let payload = app
        .expect(Method::POST, "/api/v1/cotizaciones", Some(body), StatusCode::CREATED)
        .await;
    payload["data"].clone()
}

async fn set_quote_stage(app: &TestApp, id: &str, stage: &str, expected: StatusCode) -> Value {
    app.expect(
        Method::PUT,
        &format!("/api/v1/cotizaciones/{}/etapa", id),
        Some(json!({ "stage": stage })),
        expected,
    )
    .await
}

#[tokio::test]
async fn quote_amount_follows_lines_and_numbers_increase() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Obra Belgrano").await;
    let customer_id = customer["id"].as_str().unwrap();

    let first = create_quote(
        &app,
        customer_id,
        json!({
            "title": "Ventanas living",
            "lines": [
                { "description": "Ventana corrediza 150x110", "quantity": 2, "unit_price": "1250.50" },
                { "description": "Mosquitero", "quantity": "3", "unit_price": 80 },
            ],
        }),
    )
    .await;
    assert_eq!(decimal(&first["amount"]), dec!(2741.00));
    assert_eq!(first["stage"], "draft");
    assert_eq!(first["currency"], "ARS");

    let second = create_quote(&app, customer_id, json!({ "title": "Puerta", "amount": 900 })).await;
    assert_eq!(decimal(&second["amount"]), dec!(900));
    assert_eq!(
        second["number"].as_i64().unwrap(),
        first["number"].as_i64().unwrap() + 1
    );

    // Lines replace a stale amount on update
    let id = second["id"].as_str().unwrap();
    let updated = app
        .expect(
            Method::PUT,
            &format!("/api/v1/cotizaciones/{}", id),
            Some(json!({
                "lines": [{ "description": "Puerta de abrir", "quantity": 1, "unit_price": 1500 }],
            })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(decimal(&updated["data"]["amount"]), dec!(1500));

    app.expect(
        Method::POST,
        "/api/v1/cotizaciones",
        Some(json!({
            "customer_id": customer_id,
            "title": "Negativa",
            "lines": [{ "description": "x", "quantity": 0, "unit_price": 10 }],
        })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let listed = app
        .expect(Method::GET, "/api/v1/cotizaciones?stage=draft", None, StatusCode::OK)
        .await;
    assert_eq!(listed["data"]["total"], 2);
    // Newest number first
    assert_eq!(listed["data"]["items"][0]["id"], second["id"]);
}

#[tokio::test]
async fn stage_changes_are_recorded() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Historial").await;
    let quote = create_quote(
        &app,
        customer["id"].as_str().unwrap(),
        json!({ "title": "Frente vidriado", "amount": 5000 }),
    )
    .await;
    let id = quote["id"].as_str().unwrap();

    set_quote_stage(&app, id, "sent", StatusCode::OK).await;
    set_quote_stage(&app, id, "sent", StatusCode::BAD_REQUEST).await;
    let negotiating = set_quote_stage(&app, id, "negotiation", StatusCode::OK).await;
    assert_eq!(negotiating["data"]["stage"], "negotiation");

    let history = app
        .expect(
            Method::GET,
            &format!("/api/v1/cotizaciones/{}/historial", id),
            None,
            StatusCode::OK,
        )
        .await;
    let entries = history["data"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries[0]["from_stage"].is_null());
    assert_eq!(entries[0]["to_stage"], "draft");
    assert_eq!(entries[2]["from_stage"], "sent");
    assert_eq!(entries[2]["to_stage"], "negotiation");
}

#[tokio::test]
async fn won_quote_starts_exactly_one_project() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Ganada").await;
    let quote = create_quote(
        &app,
        customer["id"].as_str().unwrap(),
        json!({ "title": "Cerramiento balcón", "description": "Aluminio negro", "amount": 12000 }),
    )
    .await;
    let id = quote["id"].as_str().unwrap();
    let project_uri = format!("/api/v1/cotizaciones/{}/proyecto", id);

    // Only won quotes start projects
    app.expect(Method::POST, &project_uri, None, StatusCode::BAD_REQUEST)
        .await;

    set_quote_stage(&app, id, "won", StatusCode::OK).await;
    let project = app
        .expect(Method::POST, &project_uri, None, StatusCode::CREATED)
        .await;
    assert_eq!(project["data"]["quote_id"], quote["id"]);
    assert_eq!(project["data"]["title"], "Cerramiento balcón");
    assert_eq!(project["data"]["current_stage"], "technical_visit");
    assert_eq!(project["data"]["measurement"], json!({}));
    assert!(project["data"]["order_number"].as_i64().unwrap() >= 1);

    app.expect(Method::POST, &project_uri, None, StatusCode::BAD_REQUEST)
        .await;
    set_quote_stage(&app, id, "lost", StatusCode::BAD_REQUEST).await;

    // Linked quotes cannot be deleted
    app.expect(
        Method::DELETE,
        &format!("/api/v1/cotizaciones/{}", id),
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn project_workflow_moves_forward_back_and_cancels() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Flujo").await;
    let created = app
        .expect(
            Method::POST,
            "/api/v1/proyectos",
            Some(json!({
                "customer_id": customer["id"],
                "title": "Casa Pilar",
                "address": "Ruta 8 km 50",
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let first_number = created["data"]["order_number"].as_i64().unwrap();

    let second = app
        .expect(
            Method::POST,
            "/api/v1/proyectos",
            Some(json!({ "customer_id": customer["id"], "title": "Casa Tigre" })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(second["data"]["order_number"].as_i64().unwrap(), first_number + 1);

    let advanced = app
        .expect(
            Method::POST,
            &format!("/api/v1/proyectos/{}/avanzar", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(advanced["data"]["current_stage"], "measurement");

    // Skipping ahead is not allowed
    app.expect(
        Method::PUT,
        &format!("/api/v1/proyectos/{}/estado", id),
        Some(json!({ "stage": "warehouse" })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    // Going back for rework is
    let back = app
        .expect(
            Method::PUT,
            &format!("/api/v1/proyectos/{}/estado", id),
            Some(json!({ "stage": "technical_visit" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(back["data"]["current_stage"], "technical_visit");

    app.expect(
        Method::PUT,
        &format!("/api/v1/proyectos/{}/estado", id),
        Some(json!({ "stage": "cancelled" })),
        StatusCode::OK,
    )
    .await;
    app.expect(
        Method::POST,
        &format!("/api/v1/proyectos/{}/avanzar", id),
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;

    let cancelled = app
        .expect(Method::GET, "/api/v1/proyectos?stage=cancelled", None, StatusCode::OK)
        .await;
    assert_eq!(cancelled["data"]["total"], 1);
    let searched = app
        .expect(Method::GET, "/api/v1/proyectos?search=pilar", None, StatusCode::OK)
        .await;
    assert_eq!(searched["data"]["items"][0]["id"], json!(id));
}

#[tokio::test]
async fn project_from_foreign_or_open_quote_is_rejected() {
    let app = TestApp::new().await;
    let owner = app.create_customer("Dueño").await;
    let other = app.create_customer("Otro").await;
    let quote = create_quote(
        &app,
        owner["id"].as_str().unwrap(),
        json!({ "title": "Ventanal", "amount": 100 }),
    )
    .await;

    app.expect(
        Method::POST,
        "/api/v1/proyectos",
        Some(json!({ "customer_id": owner["id"], "quote_id": quote["id"], "title": "Ventanal" })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    set_quote_stage(&app, quote["id"].as_str().unwrap(), "won", StatusCode::OK).await;
    app.expect(
        Method::POST,
        "/api/v1/proyectos",
        Some(json!({ "customer_id": other["id"], "quote_id": quote["id"], "title": "Ventanal" })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    // A quote links to one project only
    let linked = json!({ "customer_id": owner["id"], "quote_id": quote["id"], "title": "Ventanal" });
    app.expect(Method::POST, "/api/v1/proyectos", Some(linked.clone()), StatusCode::CREATED)
        .await;
    let duplicate = app
        .expect(Method::POST, "/api/v1/proyectos", Some(linked), StatusCode::CONFLICT)
        .await;
    assert!(duplicate["error"].as_str().unwrap().contains("already has a project"));
}

#[tokio::test]
async fn stage_details_are_validated_per_stage() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Medición").await;
    let created = app
        .expect(
            Method::POST,
            "/api/v1/proyectos",
            Some(json!({ "customer_id": customer["id"], "title": "Departamento" })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["id"].as_str().unwrap();
    let uri = format!("/api/v1/proyectos/{}/etapas/measurement", id);

    let stored = app
        .expect(
            Method::PUT,
            &uri,
            Some(json!({
                "measured_by": "Carlos",
                "openings": [
                    { "label": "Cocina", "width_mm": 1200, "height_mm": 1000, "quantity": 1 },
                ],
            })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(stored["data"]["measurement"]["measured_by"], "Carlos");
    assert_eq!(stored["data"]["measurement"]["openings"][0]["label"], "Cocina");

    // Fields of another stage do not fit here
    app.expect(
        Method::PUT,
        &uri,
        Some(json!({ "vehicle": "Camioneta" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.expect(
        Method::PUT,
        &uri,
        Some(json!({
            "openings": [{ "label": "Baño", "width_mm": 0, "height_mm": 600, "quantity": 1 }],
        })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.expect(
        Method::PUT,
        &format!("/api/v1/proyectos/{}/etapas/completed", id),
        Some(json!({})),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let cleared = app
        .expect(Method::DELETE, &uri, None, StatusCode::OK)
        .await;
    assert_eq!(cleared["data"]["measurement"], json!({}));
}

#[tokio::test]
async fn dashboard_counts_pipeline() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Tablero").await;
    let customer_id = customer["id"].as_str().unwrap();
    let quote = create_quote(&app, customer_id, json!({ "title": "A", "amount": 1 })).await;
    create_quote(&app, customer_id, json!({ "title": "B", "amount": 2 })).await;
    set_quote_stage(&app, quote["id"].as_str().unwrap(), "sent", StatusCode::OK).await;

    app.expect(
        Method::POST,
        "/api/v1/proyectos",
        Some(json!({ "customer_id": customer_id, "title": "Obra" })),
        StatusCode::CREATED,
    )
    .await;
    app.create_item("VID-4MM", "raw_material", 10).await;

    let summary = app
        .expect(Method::GET, "/api/v1/dashboard", None, StatusCode::OK)
        .await;
    let data = &summary["data"];
    assert_eq!(data["quotes_by_stage"]["draft"], 1);
    assert_eq!(data["quotes_by_stage"]["sent"], 1);
    assert_eq!(data["projects_by_stage"]["technical_visit"], 1);
    assert_eq!(data["projects_by_stage"]["completed"], 0);
    assert_eq!(data["open_tasks"], 0);
    assert_eq!(data["low_stock_items"], 1);
}
