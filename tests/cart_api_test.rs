mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn new_cart_is_empty() {
    let app = TestApp::new().await;
    let cart_id = app.create_cart().await;

    let body = response_json(
        app.request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
            .await,
    )
    .await;
    assert_eq!(body["data"]["id"], cart_id.as_str());
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(decimal(&body["data"]["total_price"]), dec!(0));
}

#[tokio::test]
async fn adding_same_product_twice_increments_quantity() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let cart_id = app.create_cart().await;

    let first = app.add_to_cart(&cart_id, beans.id, 2).await;
    assert_eq!(first.status(), 201);
    let first = response_json(first).await;

    let second = response_json(app.add_to_cart(&cart_id, beans.id, 3).await).await;
    assert_eq!(second["data"]["id"], first["data"]["id"]);
    assert_eq!(second["data"]["quantity"], 5);
    assert_eq!(decimal(&second["data"]["total_price"]), dec!(49.95));

    let cart = response_json(
        app.request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
            .await,
    )
    .await;
    assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["data"]["items"][0]["product"]["title"], "Beans");
    assert_eq!(decimal(&cart["data"]["total_price"]), dec!(49.95));
}

#[tokio::test]
async fn adding_unknown_product_reports_product_id() {
    let app = TestApp::new().await;
    let cart_id = app.create_cart().await;

    let response = app.add_to_cart(&cart_id, 777, 1).await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["details"][0]["field"], "product_id");
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let cart_id = app.create_cart().await;

    let response = app.add_to_cart(&cart_id, beans.id, 0).await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn repeated_adds_cannot_push_a_line_past_the_cap() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let cart_id = app.create_cart().await;

    let oversized = app.add_to_cart(&cart_id, beans.id, i32::MAX).await;
    assert_eq!(oversized.status(), 400);
    assert_eq!(response_json(oversized).await["details"][0]["field"], "quantity");

    assert_eq!(app.add_to_cart(&cart_id, beans.id, 1000).await.status(), 201);
    let over = app.add_to_cart(&cart_id, beans.id, 1).await;
    assert_eq!(over.status(), 400);
    assert_eq!(response_json(over).await["details"][0]["field"], "quantity");

    let cart = response_json(
        app.request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
            .await,
    )
    .await;
    assert_eq!(cart["data"]["items"][0]["quantity"], 1000);
}

#[tokio::test]
async fn items_can_be_updated_and_removed() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let cart_id = app.create_cart().await;

    let line = response_json(app.add_to_cart(&cart_id, beans.id, 1).await).await;
    let item_id = line["data"]["id"].as_i64().unwrap();
    let item_uri = format!("/api/v1/carts/{cart_id}/items/{item_id}");

    let updated = app
        .request(Method::PATCH, &item_uri, Some(json!({ "quantity": 4 })), None)
        .await;
    assert_eq!(updated.status(), 200);
    assert_eq!(response_json(updated).await["data"]["quantity"], 4);

    let product_change = app
        .request(
            Method::PATCH,
            &item_uri,
            Some(json!({ "quantity": 1, "product_id": beans.id })),
            None,
        )
        .await;
    assert_eq!(product_change.status(), 400);

    let fetched = response_json(app.request(Method::GET, &item_uri, None, None).await).await;
    assert_eq!(fetched["data"]["quantity"], 4);

    let removed = app.request(Method::DELETE, &item_uri, None, None).await;
    assert_eq!(removed.status(), 204);

    let items = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/carts/{cart_id}/items"),
            None,
            None,
        )
        .await,
    )
    .await;
    assert!(items["data"].as_array().unwrap().is_empty());

    let missing = app.request(Method::GET, &item_uri, None, None).await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn items_of_another_cart_are_not_reachable() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let mine = app.create_cart().await;
    let theirs = app.create_cart().await;

    let line = response_json(app.add_to_cart(&theirs, beans.id, 1).await).await;
    let item_id = line["data"]["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/carts/{mine}/items/{item_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn unknown_cart_is_not_found() {
    let app = TestApp::new().await;
    let unknown = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";

    let get = app
        .request(Method::GET, &format!("/api/v1/carts/{unknown}"), None, None)
        .await;
    assert_eq!(get.status(), 404);

    let add = app.add_to_cart(unknown, 1, 1).await;
    assert_eq!(add.status(), 404);
}

#[tokio::test]
async fn deleted_cart_is_gone() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let cart_id = app.create_cart().await;
    app.add_to_cart(&cart_id, beans.id, 2).await;

    let deleted = app
        .request(Method::DELETE, &format!("/api/v1/carts/{cart_id}"), None, None)
        .await;
    assert_eq!(deleted.status(), 204);

    let get = app
        .request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
        .await;
    assert_eq!(get.status(), 404);
}
