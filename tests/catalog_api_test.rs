mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn product_body(title: &str, price: &str, collection_id: i32) -> Value {
    json!({
        "title": title,
        "slug": title.to_lowercase(),
        "description": format!("{title} description"),
        "unit_price": price,
        "inventory": 5,
        "collection_id": collection_id
    })
}

fn titles(body: &Value) -> Vec<String> {
    body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn collections_report_product_counts() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let _tea = app.seed_collection("Tea").await;
    app.seed_product(coffee, "Beans", dec!(9.99)).await;
    app.seed_product(coffee, "Filter", dec!(5.00)).await;

    let body = response_json(
        app.request(Method::GET, "/api/v1/collections", None, None)
            .await,
    )
    .await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Coffee");
    assert_eq!(items[0]["products_count"], 2);
    assert_eq!(items[1]["products_count"], 0);

    let single = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/collections/{coffee}"),
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(single["data"]["products_count"], 2);
}

#[tokio::test]
async fn product_detail_includes_price_with_tax() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(10.00)).await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", beans.id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(decimal(&body["data"]["unit_price"]), dec!(10.00));
    assert_eq!(decimal(&body["data"]["price_with_tax"]), dec!(13.00));
}

#[tokio::test]
async fn product_listing_filters_searches_and_orders() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let tea = app.seed_collection("Tea").await;
    app.seed_product(coffee, "Beans", dec!(9.99)).await;
    app.seed_product(coffee, "Grinder", dec!(49.00)).await;
    app.seed_product(tea, "Green Tea", dec!(4.50)).await;

    let by_collection = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/products?collection_id={tea}"),
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(titles(&by_collection), vec!["Green Tea"]);

    let price_band = response_json(
        app.request(
            Method::GET,
            "/api/v1/products?unit_price__gt=5&unit_price__lt=20",
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(titles(&price_band), vec!["Beans"]);

    let searched = response_json(
        app.request(Method::GET, "/api/v1/products?search=GRIND", None, None)
            .await,
    )
    .await;
    assert_eq!(titles(&searched), vec!["Grinder"]);

    let ordered = response_json(
        app.request(
            Method::GET,
            "/api/v1/products?ordering=-unit_price",
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(titles(&ordered), vec!["Grinder", "Beans", "Green Tea"]);
    assert_eq!(ordered["data"]["total"], 3);
}

#[tokio::test]
async fn product_listing_paginates() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    for title in ["A", "B", "C"] {
        app.seed_product(coffee, title, dec!(1.00)).await;
    }

    let body = response_json(
        app.request(
            Method::GET,
            "/api/v1/products?page=2&page_size=2",
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(titles(&body), vec!["C"]);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["page"], 2);
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    app.seed_product(coffee, "Beans", dec!(9.99)).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/products?page=18446744073709551615&page_size=100",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert!(titles(&body).is_empty());
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn unsupported_ordering_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/products?ordering=inventory", None, None)
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn staff_create_product_with_unknown_collection_reports_field() {
    let app = TestApp::new().await;
    let (_admin, token) = app.login("admin", true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(product_body("Beans", "9.99", 999)),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["details"][0]["field"], "collection_id");
}

#[tokio::test]
async fn staff_can_manage_catalog() {
    let app = TestApp::new().await;
    let (_admin, token) = app.login("admin", true).await;

    let collection = app
        .request(
            Method::POST,
            "/api/v1/collections",
            Some(json!({ "title": "Coffee" })),
            Some(&token),
        )
        .await;
    assert_eq!(collection.status(), 201);
    let collection_id = response_json(collection).await["data"]["id"]
        .as_i64()
        .unwrap() as i32;

    let created = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(product_body("Beans", "9.99", collection_id)),
            Some(&token),
        )
        .await;
    assert_eq!(created.status(), 201);
    let product_id = response_json(created).await["data"]["id"].as_i64().unwrap();

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{product_id}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(deleted.status(), 204);

    let renamed = app
        .request(
            Method::PUT,
            &format!("/api/v1/collections/{collection_id}"),
            Some(json!({ "title": "Single Origin" })),
            Some(&token),
        )
        .await;
    assert_eq!(renamed.status(), 200);
    assert_eq!(response_json(renamed).await["data"]["title"], "Single Origin");

    let removed = app
        .request(
            Method::DELETE,
            &format!("/api/v1/collections/{collection_id}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(removed.status(), 204);
}

#[tokio::test]
async fn catalog_writes_require_staff() {
    let app = TestApp::new().await;
    let (_user, token) = app.login("ada", false).await;

    let anonymous = app
        .request(
            Method::POST,
            "/api/v1/collections",
            Some(json!({ "title": "Coffee" })),
            None,
        )
        .await;
    assert_eq!(anonymous.status(), 401);

    let customer = app
        .request(
            Method::POST,
            "/api/v1/collections",
            Some(json!({ "title": "Coffee" })),
            Some(&token),
        )
        .await;
    assert_eq!(customer.status(), 403);
}

#[tokio::test]
async fn collection_with_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let (_admin, token) = app.login("admin", true).await;
    let coffee = app.seed_collection("Coffee").await;
    app.seed_product(coffee, "Beans", dec!(9.99)).await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/collections/{coffee}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn ordered_product_cannot_be_deleted() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.login("admin", true).await;
    let (_user, token) = app.login("ada", false).await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;

    let cart_id = app.create_cart().await;
    app.add_to_cart(&cart_id, beans.id, 1).await;
    assert_eq!(app.checkout(&cart_id, Some(&token)).await.status(), 201);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{}", beans.id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn reviews_are_scoped_to_their_product() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let filter = app.seed_product(coffee, "Filter", dec!(5.00)).await;

    let created = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/reviews", beans.id),
            Some(json!({ "name": "Grace", "description": "Rich and smooth" })),
            None,
        )
        .await;
    assert_eq!(created.status(), 201);
    let review = response_json(created).await;
    let review_id = review["data"]["id"].as_i64().unwrap();
    assert_eq!(review["data"]["product_id"], beans.id);

    let beans_reviews = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/products/{}/reviews", beans.id),
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(beans_reviews["data"]["items"].as_array().unwrap().len(), 1);

    let filter_reviews = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/products/{}/reviews", filter.id),
            None,
            None,
        )
        .await,
    )
    .await;
    assert!(filter_reviews["data"]["items"].as_array().unwrap().is_empty());

    let cross = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}/reviews/{review_id}", filter.id),
            None,
            None,
        )
        .await;
    assert_eq!(cross.status(), 404);
}

#[tokio::test]
async fn reviewing_unknown_product_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products/4242/reviews",
            Some(json!({ "name": "Grace", "description": "Where is it?" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}
