//! Cart mutations against the fake shop.
//!
//! Covers the tap-to-request mapping, the per-product single-flight gate and
//! the refresh-after-mutate protocol.

#![allow(clippy::unwrap_used)]

use cynapp_core::Price;
use cynapp_integration_tests::fixtures::{GATEWAY, MONITORING, SENSOR_KIT, product};
use cynapp_integration_tests::{Route, TestApp, url};
use cynapp_storefront::cart::{CartError, Mutation, Notice, Refreshed};
use cynapp_storefront::http::{ApiError, TransportError};
use serde_json::json;

fn expected(lines: &[(&str, u32)]) -> Vec<(String, u32)> {
    lines.iter().map(|(id, q)| ((*id).to_string(), *q)).collect()
}

// =============================================================================
// Intent mapping
// =============================================================================

#[tokio::test]
async fn test_add_one_happy_path() {
    let app = TestApp::logged_in(&[]).await;
    let refreshes_before = app.shop.count(Route::Cart);

    let outcome = app.cart().apply_delta(&product(SENSOR_KIT), 1).await.unwrap();

    assert_eq!(outcome, Mutation::Confirmed);
    let mutations = app.shop.requests_to(Route::CartAction);
    assert_eq!(mutations.len(), 1);
    assert_eq!(
        mutations[0].url,
        url("https://shop.test/en/api/shop/cart/cart-1?action=add&quantity=1&productId=prod-sensor")
    );
    assert!(mutations[0].authorized);
    assert_eq!(app.shop.count(Route::Cart), refreshes_before + 1);
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 1)]));
    assert!(app.cart().updating_product_id().is_none());
}

#[tokio::test]
async fn test_decrement_to_zero_sends_remove() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 1)]).await;

    let outcome = app.cart().apply_delta(&product(SENSOR_KIT), -1).await.unwrap();

    assert_eq!(outcome, Mutation::Confirmed);
    let mutations = app.shop.requests_to(Route::CartAction);
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].action().as_deref(), Some("remove"));
    assert_eq!(mutations[0].param("productId").as_deref(), Some(SENSOR_KIT));
    assert!(app.displayed().is_empty());
}

#[tokio::test]
async fn test_decrement_non_zero_sends_absolute_update() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 3)]).await;

    app.cart().apply_delta(&product(SENSOR_KIT), -1).await.unwrap();

    let mutations = app.shop.requests_to(Route::CartAction);
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].action().as_deref(), Some("update"));
    assert_eq!(mutations[0].param("quantity").as_deref(), Some("2"));
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 2)]));
}

#[tokio::test]
async fn test_large_negative_delta_removes_without_update() {
    let app = TestApp::logged_in(&[(GATEWAY, 2)]).await;

    app.cart().apply_delta(&product(GATEWAY), -5).await.unwrap();

    let actions: Vec<_> = app
        .shop
        .requests_to(Route::CartAction)
        .iter()
        .filter_map(|r| r.action())
        .collect();
    assert_eq!(actions, vec!["remove".to_string()]);
    assert!(app.displayed().is_empty());
}

#[tokio::test]
async fn test_k_taps_send_k_single_unit_adds() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 1)]).await;
    let sensor = product(SENSOR_KIT);

    for _ in 0..3 {
        let outcome = app.cart().apply_delta(&sensor, 1).await.unwrap();
        assert_eq!(outcome, Mutation::Confirmed);
    }

    let mutations = app.shop.requests_to(Route::CartAction);
    assert_eq!(mutations.len(), 3);
    assert!(mutations.iter().all(|r| r.action().as_deref() == Some("add")));
    assert!(mutations.iter().all(|r| r.param("quantity").as_deref() == Some("1")));
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 4)]));
}

#[tokio::test]
async fn test_decrement_without_line_sends_nothing() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 1)]).await;

    let outcome = app.cart().apply_delta(&product(GATEWAY), -1).await.unwrap();

    assert_eq!(outcome, Mutation::NoOp);
    assert_eq!(app.shop.count(Route::CartAction), 0);
    assert!(app.cart().updating_product_id().is_none());
}

#[tokio::test]
async fn test_explicit_remove() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2), (GATEWAY, 1)]).await;

    app.cart().remove(&product(SENSOR_KIT)).await.unwrap();

    assert_eq!(app.displayed(), expected(&[(GATEWAY, 1)]));
    assert_eq!(
        app.shop.requests_to(Route::CartAction)[0].action().as_deref(),
        Some("remove")
    );
}

#[tokio::test]
async fn test_add_from_details_sends_quantity_once() {
    let app = TestApp::logged_in(&[]).await;
    let mut notices = app.cart().notices();

    let outcome = app
        .cart()
        .add_from_details(&product(MONITORING), 3)
        .await
        .unwrap();

    assert_eq!(outcome, Mutation::Confirmed);
    let mutations = app.shop.requests_to(Route::CartAction);
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].param("quantity").as_deref(), Some("3"));
    assert_eq!(app.displayed(), expected(&[(MONITORING, 3)]));
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::AddedToCart {
            product_id: product(MONITORING).id,
            quantity: 3,
        }
    );
}

#[tokio::test]
async fn test_subtotal_follows_confirmed_lines() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2), (GATEWAY, 1)]).await;

    // 2 x 10 + 1 x 25
    assert_eq!(app.cart().subtotal(), Price::from_cents(4500));

    app.cart().apply_delta(&product(GATEWAY), 1).await.unwrap();
    assert_eq!(app.cart().subtotal(), Price::from_cents(7000));
    assert_eq!(app.cart().subtotal().to_string(), "70.00");
}

// =============================================================================
// Single-flight gate
// =============================================================================

#[tokio::test]
async fn test_rapid_double_tap_sends_one_request() {
    let app = TestApp::logged_in(&[]).await;
    let sensor = product(SENSOR_KIT);
    let mut hold = app.shop.hold(Route::CartAction);

    let cart = app.cart().clone();
    let first_tap = sensor.clone();
    let first = tokio::spawn(async move { cart.apply_delta(&first_tap, 1).await });
    hold.arrived().await;

    assert_eq!(app.cart().updating_product_id(), Some(sensor.id.clone()));
    let second = app.cart().apply_delta(&sensor, 1).await.unwrap();
    assert_eq!(second, Mutation::Dropped);

    hold.release();
    assert_eq!(first.await.unwrap().unwrap(), Mutation::Confirmed);

    assert_eq!(app.shop.count(Route::CartAction), 1);
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 1)]));
    assert!(app.cart().updating_product_id().is_none());
}

#[tokio::test]
async fn test_gate_opens_before_follow_up_refresh() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 1)]).await;
    let sensor = product(SENSOR_KIT);
    let mut refresh_hold = app.shop.hold(Route::Cart);

    let cart = app.cart().clone();
    let tap = sensor.clone();
    let first = tokio::spawn(async move { cart.apply_delta(&tap, 1).await });
    refresh_hold.arrived().await;

    // The add has landed and its refresh is stalled; the product is free.
    assert_eq!(app.shop.lines(), expected(&[(SENSOR_KIT, 2)]));
    assert!(app.cart().state().is_loading());
    assert!(app.cart().updating_product_id().is_none());

    let second = app.cart().apply_delta(&sensor, 1).await.unwrap();
    assert_eq!(second, Mutation::Confirmed);
    assert_eq!(app.shop.count(Route::CartAction), 2);
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 3)]));

    // The first tap's refresh read the cart at 2 and arrives last.
    refresh_hold.release();
    assert_eq!(first.await.unwrap().unwrap(), Mutation::Confirmed);
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 3)]));
    assert!(!app.cart().state().is_loading());
    assert!(app.cart().updating_product_id().is_none());
}

#[tokio::test]
async fn test_different_products_are_not_serialized() {
    let app = TestApp::logged_in(&[]).await;
    let mut sensor_hold = app.shop.hold(Route::CartAction);

    let cart = app.cart().clone();
    let sensor = tokio::spawn(async move { cart.apply_delta(&product(SENSOR_KIT), 1).await });
    sensor_hold.arrived().await;

    let gateway = app.cart().apply_delta(&product(GATEWAY), 1).await.unwrap();
    assert_eq!(gateway, Mutation::Confirmed);
    assert_eq!(
        app.cart().updating_product_id(),
        Some(product(SENSOR_KIT).id)
    );

    sensor_hold.release();
    sensor.await.unwrap().unwrap();

    assert_eq!(app.shop.count(Route::CartAction), 2);
    assert!(app.cart().updating_product_id().is_none());
}

#[tokio::test]
async fn test_updating_product_is_most_recent_admission() {
    let app = TestApp::logged_in(&[]).await;
    let mut sensor_hold = app.shop.hold(Route::CartAction);
    let mut gateway_hold = app.shop.hold(Route::CartAction);

    let cart = app.cart().clone();
    let sensor = tokio::spawn(async move { cart.apply_delta(&product(SENSOR_KIT), 1).await });
    sensor_hold.arrived().await;
    let cart = app.cart().clone();
    let gateway = tokio::spawn(async move { cart.apply_delta(&product(GATEWAY), 1).await });
    gateway_hold.arrived().await;

    let state = app.cart().state();
    assert_eq!(state.updating_product_id(), Some(&product(GATEWAY).id));
    assert!(state.is_updating(&product(SENSOR_KIT).id));

    gateway_hold.release();
    gateway.await.unwrap().unwrap();
    assert_eq!(
        app.cart().updating_product_id(),
        Some(product(SENSOR_KIT).id)
    );

    sensor_hold.release();
    sensor.await.unwrap().unwrap();
    assert!(app.cart().updating_product_id().is_none());
}

#[tokio::test]
async fn test_dropped_future_releases_gate() {
    let app = TestApp::logged_in(&[]).await;
    let mut hold = app.shop.hold(Route::CartAction);

    let cart = app.cart().clone();
    let tap = tokio::spawn(async move { cart.apply_delta(&product(SENSOR_KIT), 1).await });
    hold.arrived().await;
    assert!(app.cart().updating_product_id().is_some());

    tap.abort();
    assert!(tap.await.unwrap_err().is_cancelled());
    assert!(app.cart().updating_product_id().is_none());

    let outcome = app.cart().apply_delta(&product(SENSOR_KIT), 1).await.unwrap();
    assert_eq!(outcome, Mutation::Confirmed);
}

#[tokio::test]
async fn test_observers_see_gate_open_and_close() {
    let app = TestApp::logged_in(&[]).await;
    let mut states = app.cart().subscribe();
    let mut hold = app.shop.hold(Route::CartAction);

    let cart = app.cart().clone();
    let tap = tokio::spawn(async move { cart.apply_delta(&product(SENSOR_KIT), 1).await });
    hold.arrived().await;

    assert!(states.has_changed().unwrap());
    assert!(states.borrow_and_update().is_updating(&product(SENSOR_KIT).id));

    hold.release();
    tap.await.unwrap().unwrap();
    let last = states.borrow_and_update().clone();
    assert!(last.updating_product_id().is_none());
    assert_eq!(last.quantity_of(&product(SENSOR_KIT).id), 1);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_server_error_leaves_lines_and_surfaces_message() {
    let app = TestApp::logged_in(&[(GATEWAY, 1)]).await;
    let mut notices = app.cart().notices();
    app.shop.script(
        Route::CartAction,
        409,
        &json!({ "message": "Only 5 gateways left in stock" }),
    );
    let refreshes = app.shop.count(Route::Cart);

    let err = app.cart().apply_delta(&product(GATEWAY), 1).await.unwrap_err();

    assert_eq!(err.user_message(), "Only 5 gateways left in stock");
    assert_eq!(app.displayed(), expected(&[(GATEWAY, 1)]));
    assert_eq!(app.shop.count(Route::Cart), refreshes);
    assert!(app.cart().updating_product_id().is_none());
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::MutationFailed {
            product_id: product(GATEWAY).id,
            message: "Only 5 gateways left in stock".to_string(),
        }
    );
}

#[tokio::test]
async fn test_server_error_without_message_uses_code() {
    let app = TestApp::logged_in(&[]).await;
    app.shop.script(Route::CartAction, 502, &json!("bad gateway"));

    let err = app.cart().apply_delta(&product(GATEWAY), 1).await.unwrap_err();

    assert_eq!(err.user_message(), "Error : code 502");
    assert!(app.cart().updating_product_id().is_none());
}

#[tokio::test]
async fn test_transport_error_clears_gate() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2)]).await;
    app.shop
        .script_error(Route::CartAction, TransportError::Timeout);

    let result = app.cart().apply_delta(&product(SENSOR_KIT), -1).await;

    assert!(matches!(
        result,
        Err(CartError::Api(ApiError::Transport(TransportError::Timeout)))
    ));
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 2)]));
    assert!(app.cart().updating_product_id().is_none());

    // The next tap goes through.
    app.cart().apply_delta(&product(SENSOR_KIT), -1).await.unwrap();
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 1)]));
}

#[tokio::test]
async fn test_failed_follow_up_refresh_still_confirms() {
    let app = TestApp::logged_in(&[]).await;
    let mut notices = app.cart().notices();
    app.shop.script_error(Route::Cart, TransportError::Timeout);

    let outcome = app.cart().apply_delta(&product(SENSOR_KIT), 1).await.unwrap();

    assert_eq!(outcome, Mutation::Confirmed);
    assert!(app.displayed().is_empty());
    assert!(matches!(
        notices.try_recv().unwrap(),
        Notice::RefreshFailed { .. }
    ));
    assert!(app.cart().updating_product_id().is_none());

    // Any later successful refresh shows reality.
    app.cart().refresh().await.unwrap();
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 1)]));
}

#[tokio::test]
async fn test_logged_out_taps_are_rejected_without_requests() {
    let app = TestApp::new();

    let result = app.cart().apply_delta(&product(SENSOR_KIT), 1).await;

    assert!(matches!(result, Err(CartError::Unauthenticated)));
    assert!(app.shop.requests().is_empty());
    assert!(app.cart().updating_product_id().is_none());
}

// =============================================================================
// Convergence
// =============================================================================

#[tokio::test]
async fn test_stale_refresh_is_superseded() {
    let app = TestApp::logged_in(&[]).await;

    // A manual refresh reads the empty cart, then stalls.
    let mut stale_hold = app.shop.hold(Route::Cart);
    let cart = app.cart().clone();
    let stale = tokio::spawn(async move { cart.refresh().await });
    stale_hold.arrived().await;

    // A mutation lands and its own refresh completes first.
    app.cart().apply_delta(&product(SENSOR_KIT), 1).await.unwrap();
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 1)]));

    let snapshot = app.storefront.credentials().load_cart_bytes().unwrap();
    assert_eq!(snapshot, app.shop.last_cart_body());

    // The stale response arrives last and is discarded.
    stale_hold.release();
    assert_eq!(stale.await.unwrap().unwrap(), Refreshed::Superseded);
    assert_eq!(app.displayed(), expected(&[(SENSOR_KIT, 1)]));
    assert_eq!(app.storefront.credentials().load_cart_bytes().unwrap(), snapshot);
    assert!(!app.cart().state().is_loading());
}

#[tokio::test]
async fn test_concurrent_mutations_converge_to_server_state() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2)]).await;
    let mut sensor_hold = app.shop.hold(Route::CartAction);

    let cart = app.cart().clone();
    let sensor = tokio::spawn(async move { cart.apply_delta(&product(SENSOR_KIT), -1).await });
    sensor_hold.arrived().await;

    let cart = app.cart().clone();
    let gateway = tokio::spawn(async move { cart.apply_delta(&product(GATEWAY), 1).await });
    let cart = app.cart().clone();
    let monitoring =
        tokio::spawn(async move { cart.add_from_details(&product(MONITORING), 2).await });
    gateway.await.unwrap().unwrap();
    monitoring.await.unwrap().unwrap();

    sensor_hold.release();
    sensor.await.unwrap().unwrap();

    assert_eq!(app.displayed(), app.shop.lines());
    let mut displayed = app.displayed();
    displayed.sort();
    assert_eq!(
        displayed,
        expected(&[(GATEWAY, 1), (MONITORING, 2), (SENSOR_KIT, 1)])
    );
    assert!(app.cart().state().in_flight().is_empty());
}
