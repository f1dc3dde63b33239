//! Hosted checkout and the post-payment cart reset.
//!
//! These tests run on a paused clock so the settle delay is exact.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use cynapp_integration_tests::fixtures::{GATEWAY, SENSOR_KIT};
use cynapp_integration_tests::shop::CHECKOUT_URL;
use cynapp_integration_tests::{Route, TestApp, url};
use cynapp_storefront::cart::Refreshed;
use cynapp_storefront::checkout::{CheckoutError, CheckoutOutcome};
use cynapp_storefront::deep_link::Routed;
use cynapp_storefront::http::Method;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::Instant;

const SETTLE: Duration = Duration::from_millis(500);

async fn return_to_app(app: &TestApp, link: &str) -> CheckoutOutcome {
    match app.storefront.router().route(&url(link)).await.unwrap() {
        Routed::Checkout(outcome) => outcome,
        other => panic!("expected a checkout return, got {other:?}"),
    }
}

// =============================================================================
// Starting a checkout
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_begin_opens_hosted_page() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2), (GATEWAY, 1)]).await;

    let session = app.storefront.checkout().begin().await.unwrap();

    assert!(session.can_checkout);
    assert_eq!(session.url, CHECKOUT_URL);
    assert_eq!(app.browser.opened(), vec![url(CHECKOUT_URL)]);

    let requests = app.shop.requests_to(Route::Checkout);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].param("appMobileCheckout").as_deref(), Some("true"));
    assert!(requests[0].authorized);
}

#[tokio::test(start_paused = true)]
async fn test_begin_requires_login() {
    let app = TestApp::new();

    let err = app.storefront.checkout().begin().await.unwrap_err();

    assert!(matches!(err, CheckoutError::Unauthenticated));
    assert!(app.shop.requests().is_empty());
    assert!(app.browser.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ineligible_uses_server_message() {
    let app = TestApp::logged_in(&[]).await;

    let err = app.storefront.checkout().begin().await.unwrap_err();

    assert!(matches!(err, CheckoutError::Ineligible(_)));
    assert_eq!(err.user_message(), "Your cart is empty");
    assert!(app.browser.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ineligible_falls_back_to_cart_reason() {
    let app = TestApp::logged_in(&[]).await;
    app.shop
        .script(Route::Checkout, 200, &json!({ "url": "", "canCheckout": false }));

    let err = app.storefront.checkout().begin().await.unwrap_err();

    // The empty cart's eligibility reason.
    assert_eq!(err.user_message(), "Your cart is empty");
}

#[tokio::test(start_paused = true)]
async fn test_ineligible_without_any_reason_uses_default() {
    let app = TestApp::logged_in(&[(GATEWAY, 1)]).await;
    app.shop
        .script(Route::Checkout, 200, &json!({ "url": "", "canCheckout": false }));

    let err = app.storefront.checkout().begin().await.unwrap_err();

    assert_eq!(err.user_message(), "Unable to proceed further");
}

#[tokio::test(start_paused = true)]
async fn test_error_status_message_is_verbatim() {
    let app = TestApp::logged_in(&[(GATEWAY, 1)]).await;
    app.shop.script(
        Route::Checkout,
        422,
        &json!({ "message": "Please add a billing address first" }),
    );

    let err = app.storefront.checkout().begin().await.unwrap_err();

    assert!(matches!(err, CheckoutError::Api(_)));
    assert_eq!(err.user_message(), "Please add a billing address first");
    assert!(app.browser.opened().is_empty());
}

// =============================================================================
// Returning from the payment page
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_success_clears_then_refreshes_after_settle() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2), (GATEWAY, 1)]).await;
    app.storefront.checkout().begin().await.unwrap();
    let closes = app.browser.close_count();
    let refreshes = app.shop.count(Route::Cart);
    let started = Instant::now();

    let outcome = return_to_app(&app, "cynapp://checkout?success=true&orderId=ORD-9").await;

    assert_eq!(
        outcome,
        CheckoutOutcome::Success {
            order_id: "ORD-9".to_string()
        }
    );
    assert_eq!(outcome.to_string(), "Successfully paid! Order no. ORD-9");
    assert_eq!(app.browser.close_count(), closes + 1);
    assert!(app.displayed().is_empty());
    assert!(app.storefront.checkout().settle_pending());

    // Still empty and not yet re-read one turn later.
    tokio::task::yield_now().await;
    assert!(app.displayed().is_empty());
    assert_eq!(app.shop.count(Route::Cart), refreshes);

    app.shop.finalize_payment();
    app.storefront.checkout().wait_for_settle().await;

    assert!(started.elapsed() >= SETTLE);
    assert_eq!(app.shop.count(Route::Cart), refreshes + 1);
    assert!(app.displayed().is_empty());
    assert!(!app.storefront.checkout().settle_pending());
}

#[tokio::test(start_paused = true)]
async fn test_no_refresh_before_settle_delay() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 1)]).await;
    let refreshes = app.shop.count(Route::Cart);

    return_to_app(&app, "cynapp://checkout?success=true&orderId=ORD-1").await;

    tokio::time::sleep(SETTLE - Duration::from_millis(1)).await;
    assert_eq!(app.shop.count(Route::Cart), refreshes);
    assert!(app.displayed().is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(app.shop.count(Route::Cart), refreshes + 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_refresh_cannot_reshow_paid_items() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2)]).await;

    // A refresh reads the unpaid cart, then stalls.
    let mut hold = app.shop.hold(Route::Cart);
    let cart = app.cart().clone();
    let stale = tokio::spawn(async move { cart.refresh().await });
    hold.arrived().await;

    return_to_app(&app, "cynapp://checkout?success=true&orderId=ORD-2").await;
    app.shop.finalize_payment();

    hold.release();
    assert_eq!(stale.await.unwrap().unwrap(), Refreshed::Superseded);
    assert!(app.displayed().is_empty());

    app.storefront.checkout().wait_for_settle().await;
    assert!(app.displayed().is_empty());
    assert!(!app.cart().state().is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_success_schedules_one_refresh() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 1)]).await;
    let refreshes = app.shop.count(Route::Cart);

    return_to_app(&app, "cynapp://checkout?success=true&orderId=ORD-3").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    return_to_app(&app, "cynapp://checkout?success=true&orderId=ORD-3").await;

    app.shop.finalize_payment();
    app.storefront.checkout().wait_for_settle().await;
    tokio::time::sleep(SETTLE).await;

    assert_eq!(app.shop.count(Route::Cart), refreshes + 1);
}

#[tokio::test(start_paused = true)]
async fn test_logout_before_settle_skips_refresh() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 1)]).await;
    let refreshes = app.shop.count(Route::Cart);
    let mut notices = app.cart().notices();

    return_to_app(&app, "cynapp://checkout?success=true&orderId=ORD-4").await;
    app.storefront.session().logout().unwrap();
    app.storefront.checkout().wait_for_settle().await;

    assert_eq!(app.shop.count(Route::Cart), refreshes);
    assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));
    assert!(app.displayed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_user_cancel_keeps_cart() {
    let app = TestApp::logged_in(&[(SENSOR_KIT, 2)]).await;
    app.storefront.checkout().begin().await.unwrap();
    let refreshes = app.shop.count(Route::Cart);

    let outcome = return_to_app(&app, "cynapp://checkout?userCancel=true").await;

    assert_eq!(outcome, CheckoutOutcome::UserCancelled);
    assert_eq!(app.displayed(), vec![(SENSOR_KIT.to_string(), 2)]);
    assert!(!app.storefront.checkout().settle_pending());

    tokio::time::sleep(SETTLE * 2).await;
    assert_eq!(app.shop.count(Route::Cart), refreshes);
}

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_cart() {
    let app = TestApp::logged_in(&[(GATEWAY, 1)]).await;

    let outcome = return_to_app(&app, "cynapp://checkout?success=false&userCancel=false").await;

    assert_eq!(
        outcome,
        CheckoutOutcome::Failed {
            message: "payment failed".to_string()
        }
    );
    assert_eq!(outcome.to_string(), "Payment failed: payment failed");
    assert_eq!(app.displayed(), vec![(GATEWAY.to_string(), 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_return_url_decoding() {
    let app = TestApp::logged_in(&[]).await;

    let cases = [
        (
            "cynapp://checkout?success=true&orderId=X",
            CheckoutOutcome::Success {
                order_id: "X".to_string(),
            },
        ),
        (
            "cynapp://checkout?success=true",
            CheckoutOutcome::Success {
                order_id: "-".to_string(),
            },
        ),
        (
            "cynapp://checkout?userCancel=true&success=true&orderId=Y",
            CheckoutOutcome::Success {
                order_id: "Y".to_string(),
            },
        ),
        ("cynapp://checkout?userCancel=true", CheckoutOutcome::UserCancelled),
        (
            "cynapp://checkout",
            CheckoutOutcome::Failed {
                message: "payment failed".to_string(),
            },
        ),
        (
            "cynapp://checkout?success=TRUE",
            CheckoutOutcome::Failed {
                message: "payment failed".to_string(),
            },
        ),
    ];

    for (link, expected) in cases {
        assert_eq!(return_to_app(&app, link).await, expected, "{link}");
    }
}
