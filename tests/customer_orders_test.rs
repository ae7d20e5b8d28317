//! Customer profiles, order visibility and staff order maintenance.

mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use storefront_api::{
    auth::consts::CUSTOMERS_VIEW_HISTORY,
    entities::{customer, order},
    services::customers::provision_customer,
};

/// Places a one-line order for `token` and returns the order id.
async fn place_order(app: &TestApp, token: &str, product_id: i32, quantity: i32) -> i64 {
    let cart_id = app.create_cart().await;
    app.add_to_cart(&cart_id, product_id, quantity).await;
    let response = app.checkout(&cart_id, Some(token)).await;
    assert_eq!(response.status(), 201);
    response_json(response).await["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn registering_a_user_provisions_exactly_one_customer() {
    let app = TestApp::new().await;
    let user = app.create_user("ada", false).await;

    let count = || {
        customer::Entity::find()
            .filter(customer::Column::UserId.eq(user.id))
            .count(&*app.state.db)
    };
    assert_eq!(count().await.unwrap(), 1);

    // Replaying the provisioning is a no-op.
    let inserted = provision_customer(&*app.state.db, user.id).await.unwrap();
    assert!(!inserted);
    assert_eq!(count().await.unwrap(), 1);
}

#[tokio::test]
async fn callers_read_and_update_their_own_profile() {
    let app = TestApp::new().await;
    let (user, token) = app.login("ada", false).await;

    let me = app
        .request(Method::GET, "/api/v1/customers/me", None, Some(&token))
        .await;
    assert_eq!(me.status(), 200);
    let me = response_json(me).await;
    assert_eq!(me["data"]["user_id"], user.id);
    assert_eq!(me["data"]["membership"], "bronze");

    let updated = app
        .request(
            Method::PUT,
            "/api/v1/customers/me",
            Some(json!({
                "phone": "+44 20 7946 0000",
                "birth_date": "1815-12-10",
                "membership": "gold"
            })),
            Some(&token),
        )
        .await;
    assert_eq!(updated.status(), 200);
    let updated = response_json(updated).await;
    assert_eq!(updated["data"]["membership"], "gold");
    assert_eq!(updated["data"]["birth_date"], "1815-12-10");
    assert_eq!(updated["data"]["id"], me["data"]["id"]);

    let anonymous = app
        .request(Method::GET, "/api/v1/customers/me", None, None)
        .await;
    assert_eq!(anonymous.status(), 401);
}

#[tokio::test]
async fn customer_listing_is_staff_only() {
    let app = TestApp::new().await;
    let (_user, token) = app.login("ada", false).await;
    let (_admin, admin_token) = app.login("admin", true).await;

    let forbidden = app
        .request(Method::GET, "/api/v1/customers", None, Some(&token))
        .await;
    assert_eq!(forbidden.status(), 403);

    let listed = app
        .request(Method::GET, "/api/v1/customers", None, Some(&admin_token))
        .await;
    assert_eq!(listed.status(), 200);
    assert_eq!(response_json(listed).await["data"]["total"], 2);
}

#[tokio::test]
async fn staff_cannot_create_a_second_profile_for_a_user() {
    let app = TestApp::new().await;
    let (user, _token) = app.login("ada", false).await;
    let (_admin, admin_token) = app.login("admin", true).await;

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "user_id": user.id })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(duplicate.status(), 409);

    let unknown_user = app
        .request(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "user_id": 9999 })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(unknown_user.status(), 400);
    assert_eq!(response_json(unknown_user).await["details"][0]["field"], "user_id");
}

#[tokio::test]
async fn history_requires_permission() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let (buyer, buyer_token) = app.login("ada", false).await;
    place_order(&app, &buyer_token, beans.id, 2).await;
    place_order(&app, &buyer_token, beans.id, 1).await;

    let customer_id = customer::Entity::find()
        .filter(customer::Column::UserId.eq(buyer.id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .id;
    let uri = format!("/api/v1/customers/{customer_id}/history");

    let analyst = app.create_user("grace", false).await;
    let without = app.token_for(&analyst, &[]);
    let with = app.token_for(&analyst, &[CUSTOMERS_VIEW_HISTORY]);

    let denied = app.request(Method::GET, &uri, None, Some(&without)).await;
    assert_eq!(denied.status(), 403);

    let allowed = app.request(Method::GET, &uri, None, Some(&with)).await;
    assert_eq!(allowed.status(), 200);
    let body = response_json(allowed).await;
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(decimal(&orders[0]["total_price"]), dec!(19.98));
    assert_eq!(decimal(&orders[1]["total_price"]), dec!(9.99));
}

#[tokio::test]
async fn orders_are_visible_only_to_their_owner_and_staff() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let (_ada, ada_token) = app.login("ada", false).await;
    let (_bob, bob_token) = app.login("bob", false).await;
    let (_admin, admin_token) = app.login("admin", true).await;

    let ada_order = place_order(&app, &ada_token, beans.id, 1).await;
    place_order(&app, &bob_token, beans.id, 1).await;

    let ada_list = response_json(
        app.request(Method::GET, "/api/v1/orders", None, Some(&ada_token))
            .await,
    )
    .await;
    assert_eq!(ada_list["data"]["total"], 1);
    assert_eq!(ada_list["data"]["items"][0]["id"], ada_order);

    let foreign = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{ada_order}"),
            None,
            Some(&bob_token),
        )
        .await;
    assert_eq!(foreign.status(), 404);

    let staff_list = response_json(
        app.request(Method::GET, "/api/v1/orders", None, Some(&admin_token))
            .await,
    )
    .await;
    assert_eq!(staff_list["data"]["total"], 2);

    let anonymous = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(anonymous.status(), 401);
}

#[tokio::test]
async fn only_staff_change_payment_status() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let (_ada, ada_token) = app.login("ada", false).await;
    let (_admin, admin_token) = app.login("admin", true).await;
    let order_id = place_order(&app, &ada_token, beans.id, 1).await;
    let uri = format!("/api/v1/orders/{order_id}");

    let by_owner = app
        .request(
            Method::PATCH,
            &uri,
            Some(json!({ "payment_status": "complete" })),
            Some(&ada_token),
        )
        .await;
    assert_eq!(by_owner.status(), 403);

    let unknown_field = app
        .request(
            Method::PATCH,
            &uri,
            Some(json!({ "payment_status": "complete", "customer_id": 1 })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(unknown_field.status(), 400);

    let by_staff = app
        .request(
            Method::PATCH,
            &uri,
            Some(json!({ "payment_status": "complete" })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(by_staff.status(), 200);
    let body = response_json(by_staff).await;
    assert_eq!(body["data"]["payment_status"], "complete");
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn staff_can_delete_orders() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let (_ada, ada_token) = app.login("ada", false).await;
    let (_admin, admin_token) = app.login("admin", true).await;
    let order_id = place_order(&app, &ada_token, beans.id, 1).await;
    let uri = format!("/api/v1/orders/{order_id}");

    let by_owner = app.request(Method::DELETE, &uri, None, Some(&ada_token)).await;
    assert_eq!(by_owner.status(), 403);

    let by_staff = app
        .request(Method::DELETE, &uri, None, Some(&admin_token))
        .await;
    assert_eq!(by_staff.status(), 204);
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn customer_with_orders_cannot_be_deleted() {
    let app = TestApp::new().await;
    let coffee = app.seed_collection("Coffee").await;
    let beans = app.seed_product(coffee, "Beans", dec!(9.99)).await;
    let (ada, ada_token) = app.login("ada", false).await;
    let (_admin, admin_token) = app.login("admin", true).await;
    place_order(&app, &ada_token, beans.id, 1).await;

    let customer_id = customer::Entity::find()
        .filter(customer::Column::UserId.eq(ada.id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .id;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/customers/{customer_id}"),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), 405);
}
