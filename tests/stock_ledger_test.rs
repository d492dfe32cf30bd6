//! Stock movements, balances and idempotent retries through the API.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn movement(app: &TestApp, body: Value, expected: StatusCode) -> Value {
    app.expect(Method::POST, "/api/v1/stock/movements", Some(body), expected)
        .await
}

async fn balance(app: &TestApp, item: &Value, warehouse: &Value) -> (rust_decimal::Decimal, rust_decimal::Decimal) {
    let payload = app
        .expect(
            Method::GET,
            &format!(
                "/api/v1/stock/balances?item_id={}&warehouse_id={}",
                item["id"].as_str().unwrap(),
                warehouse["id"].as_str().unwrap()
            ),
            None,
            StatusCode::OK,
        )
        .await;
    let row = &payload["data"][0];
    (decimal(&row["on_hand"]), decimal(&row["reserved"]))
}

#[tokio::test]
async fn receipts_issues_and_transfers() {
    let app = TestApp::new().await;
    let item = app.create_item("perfil-a30", "raw_material", 0).await;
    assert_eq!(item["sku"], "PERFIL-A30");
    let main = app.create_warehouse("central").await;
    let shop = app.create_warehouse("taller").await;

    let received = movement(
        &app,
        json!({
            "kind": "in",
            "item_id": item["id"],
            "warehouse_id": main["id"],
            "quantity": "25.5",
            "reference": "Remito 0001-00012345",
        }),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(received["data"]["replayed"], false);
    assert_eq!(decimal(&received["data"]["movements"][0]["on_hand_after"]), dec!(25.5));

    movement(
        &app,
        json!({ "kind": "out", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 5.5 }),
        StatusCode::CREATED,
    )
    .await;

    let short = movement(
        &app,
        json!({ "kind": "out", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 100 }),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert!(short["error"].as_str().unwrap().contains("PERFIL-A30"));

    let transferred = movement(
        &app,
        json!({
            "kind": "transfer",
            "item_id": item["id"],
            "warehouse_id": main["id"],
            "to_warehouse_id": shop["id"],
            "quantity": 8,
        }),
        StatusCode::CREATED,
    )
    .await;
    let legs = transferred["data"]["movements"].as_array().unwrap();
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0]["batch_id"], legs[1]["batch_id"]);

    assert_eq!(balance(&app, &item, &main).await.0, dec!(12));
    assert_eq!(balance(&app, &item, &shop).await.0, dec!(8));

    // A transfer needs a different destination
    movement(
        &app,
        json!({
            "kind": "transfer",
            "item_id": item["id"],
            "warehouse_id": main["id"],
            "to_warehouse_id": main["id"],
            "quantity": 1,
        }),
        StatusCode::BAD_REQUEST,
    )
    .await;
    movement(
        &app,
        json!({ "kind": "in", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 0 }),
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn reservations_limit_what_can_leave() {
    let app = TestApp::new().await;
    let item = app.create_item("VID-6MM", "raw_material", 0).await;
    let main = app.create_warehouse("CENTRAL").await;

    movement(
        &app,
        json!({ "kind": "in", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 10 }),
        StatusCode::CREATED,
    )
    .await;
    movement(
        &app,
        json!({ "kind": "reserve", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 7 }),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(balance(&app, &item, &main).await, (dec!(10), dec!(7)));

    movement(
        &app,
        json!({ "kind": "out", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 4 }),
        StatusCode::BAD_REQUEST,
    )
    .await;
    // Adjusting below the reserved quantity is refused
    movement(
        &app,
        json!({ "kind": "adjust", "item_id": item["id"], "warehouse_id": main["id"], "quantity": -5 }),
        StatusCode::BAD_REQUEST,
    )
    .await;
    movement(
        &app,
        json!({ "kind": "unreserve", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 8 }),
        StatusCode::BAD_REQUEST,
    )
    .await;

    movement(
        &app,
        json!({ "kind": "unreserve", "item_id": item["id"], "warehouse_id": main["id"], "quantity": 7 }),
        StatusCode::CREATED,
    )
    .await;
    movement(
        &app,
        json!({ "kind": "adjust", "item_id": item["id"], "warehouse_id": main["id"], "quantity": -5 }),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(balance(&app, &item, &main).await, (dec!(5), dec!(0)));
}

#[tokio::test]
async fn idempotency_key_replays_the_first_result() {
    let app = TestApp::new().await;
    let item = app.create_item("HERR-01", "component", 0).await;
    let main = app.create_warehouse("CENTRAL").await;
    let body = json!({
        "kind": "in",
        "item_id": item["id"],
        "warehouse_id": main["id"],
        "quantity": 3,
        "idempotency_key": "remito-77",
    });

    let first = movement(&app, body.clone(), StatusCode::CREATED).await;
    let again = movement(&app, body.clone(), StatusCode::OK).await;
    assert_eq!(again["data"]["replayed"], true);
    assert_eq!(
        again["data"]["movements"][0]["id"],
        first["data"]["movements"][0]["id"]
    );
    assert_eq!(balance(&app, &item, &main).await.0, dec!(3));

    let mut different = body;
    different["quantity"] = json!(4);
    movement(&app, different, StatusCode::CONFLICT).await;

    // A transfer key stays tied to its destination
    let shop = app.create_warehouse("TALLER").await;
    let site = app.create_warehouse("OBRA").await;
    let transfer = json!({
        "kind": "transfer",
        "item_id": item["id"],
        "warehouse_id": main["id"],
        "to_warehouse_id": shop["id"],
        "quantity": 2,
        "idempotency_key": "traslado-5",
    });
    movement(&app, transfer.clone(), StatusCode::CREATED).await;
    let replayed = movement(&app, transfer.clone(), StatusCode::OK).await;
    assert_eq!(replayed["data"]["movements"].as_array().unwrap().len(), 2);

    let mut elsewhere = transfer;
    elsewhere["to_warehouse_id"] = site["id"].clone();
    movement(&app, elsewhere, StatusCode::CONFLICT).await;
    assert_eq!(balance(&app, &item, &shop).await.0, dec!(2));
    assert_eq!(balance(&app, &item, &main).await.0, dec!(1));
}

#[tokio::test]
async fn low_stock_and_ledger_order() {
    let app = TestApp::new().await;
    let low = app.create_item("LOW-1", "raw_material", 10).await;
    let fine = app.create_item("OK-1", "raw_material", 2).await;
    let main = app.create_warehouse("CENTRAL").await;

    for (item, qty) in [(&low, 4), (&fine, 5)] {
        movement(
            &app,
            json!({ "kind": "in", "item_id": item["id"], "warehouse_id": main["id"], "quantity": qty }),
            StatusCode::CREATED,
        )
        .await;
    }
    movement(
        &app,
        json!({ "kind": "out", "item_id": low["id"], "warehouse_id": main["id"], "quantity": 1 }),
        StatusCode::CREATED,
    )
    .await;

    let report = app
        .expect(Method::GET, "/api/v1/stock/low-stock", None, StatusCode::OK)
        .await;
    let rows = report["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["sku"], "LOW-1");
    assert_eq!(decimal(&rows[0]["on_hand"]), dec!(3));
    assert_eq!(decimal(&rows[0]["shortfall"]), dec!(7));

    let ledger = app
        .expect(
            Method::GET,
            &format!("/api/v1/stock/movements?item_id={}", low["id"].as_str().unwrap()),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(ledger["data"]["total"], 2);
    assert_eq!(ledger["data"]["items"][0]["kind"], "out");
    assert_eq!(ledger["data"]["items"][1]["kind"], "in");

    let outs = app
        .expect(Method::GET, "/api/v1/stock/movements?kind=out", None, StatusCode::OK)
        .await;
    assert_eq!(outs["data"]["total"], 1);
}

#[tokio::test]
async fn item_and_warehouse_codes_are_unique() {
    let app = TestApp::new().await;
    app.create_item("DUP-1", "component", 0).await;
    app.expect(
        Method::POST,
        "/api/v1/stock/items",
        Some(json!({ "sku": "dup-1", "name": "Otro", "unit": "u", "kind": "component" })),
        StatusCode::CONFLICT,
    )
    .await;

    app.create_warehouse("NORTE").await;
    app.expect(
        Method::POST,
        "/api/v1/stock/warehouses",
        Some(json!({ "code": "norte", "name": "Norte bis" })),
        StatusCode::CONFLICT,
    )
    .await;

    let items = app
        .expect(Method::GET, "/api/v1/stock/items?search=dup", None, StatusCode::OK)
        .await;
    assert_eq!(items["data"]["total"], 1);
}
