//! In-memory shop backend.
//!
//! [`FakeShop`] implements [`Transport`] and keeps a server-side cart, so
//! mutations and refreshes behave like the real backend: the cart endpoint
//! always returns the authoritative state, and a mutation only answers with
//! a status.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cynapp_storefront::http::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use url::Url;

use crate::fixtures;

/// Cart id the shop hands out.
pub const CART_ID: &str = "cart-1";

/// Owner of the cart.
pub const OWNER_ID: &str = "user-1";

/// Hosted payment page returned by the checkout endpoint.
pub const CHECKOUT_URL: &str = "https://pay.shop.test/session/cs_test_1";

/// Endpoint families the shop distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `GET {locale}/api/shop/cart`
    Cart,
    /// `GET {locale}/api/shop/cart/{cartId}?action=...`
    CartAction,
    /// `POST {locale}/api/shop/checkout`
    Checkout,
    /// `GET {locale}/api/shop/products`
    Products,
    /// `GET {locale}/api/shop/categories`
    Categories,
    /// Anything else.
    Other,
}

impl Route {
    fn of(url: &Url) -> Self {
        let path = url.path();
        if path.ends_with("/api/shop/cart") {
            Self::Cart
        } else if path.contains("/api/shop/cart/") {
            Self::CartAction
        } else if path.ends_with("/api/shop/checkout") {
            Self::Checkout
        } else if path.ends_with("/api/shop/products") {
            Self::Products
        } else if path.ends_with("/api/shop/categories") {
            Self::Categories
        } else {
            Self::Other
        }
    }
}

/// A request as the shop saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub route: Route,
    pub url: Url,
    pub authorized: bool,
}

impl RecordedRequest {
    /// Value of query parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// `action` of a cart mutation.
    #[must_use]
    pub fn action(&self) -> Option<String> {
        self.param("action")
    }
}

type Reply = Result<ApiResponse, TransportError>;

// =============================================================================
// Holds
// =============================================================================

/// Test-side handle on a parked request.
///
/// The response is computed when the request arrives and delivered when the
/// hold is released (or dropped).
#[derive(Debug)]
pub struct Hold {
    arrived: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

impl Hold {
    /// Wait until the client is awaiting the parked response.
    pub async fn arrived(&mut self) {
        if let Some(arrived) = self.arrived.take() {
            let _ = arrived.await;
        }
    }

    /// Deliver the parked response.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Debug)]
struct Parked {
    route: Route,
    arrived: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

impl Parked {
    async fn wait(self) {
        let _ = self.arrived.send(());
        let _ = self.release.await;
    }
}

// =============================================================================
// FakeShop
// =============================================================================

/// Scripted, stateful stand-in for the shop backend.
#[derive(Debug)]
pub struct FakeShop {
    state: Mutex<ShopState>,
}

#[derive(Debug)]
struct ShopState {
    catalog: Vec<Value>,
    lines: Vec<(String, u32)>,
    offline: bool,
    scripted: VecDeque<(Route, Reply)>,
    parked: VecDeque<Parked>,
    log: Vec<RecordedRequest>,
    last_cart_body: Option<Vec<u8>>,
}

impl Default for FakeShop {
    fn default() -> Self {
        Self::with_catalog(fixtures::catalog())
    }
}

impl FakeShop {
    /// A shop selling `catalog` (product JSON objects) with an empty cart.
    #[must_use]
    pub const fn with_catalog(catalog: Vec<Value>) -> Self {
        Self {
            state: Mutex::new(ShopState {
                catalog,
                lines: Vec::new(),
                offline: false,
                scripted: VecDeque::new(),
                parked: VecDeque::new(),
                log: Vec::new(),
                last_cart_body: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the server cart.
    pub fn set_lines(&self, lines: &[(&str, u32)]) {
        self.lock().lines = lines
            .iter()
            .map(|(id, quantity)| ((*id).to_string(), *quantity))
            .collect();
    }

    /// The server cart as `(product id, quantity)` pairs.
    #[must_use]
    pub fn lines(&self) -> Vec<(String, u32)> {
        self.lock().lines.clone()
    }

    /// Empty the server cart, as payment finalization does.
    pub fn finalize_payment(&self) {
        self.lock().lines.clear();
    }

    /// Fail every request at the transport level while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Answer the next `route` request with `status` and `body` instead of
    /// the simulated backend. The cart is not touched.
    pub fn script(&self, route: Route, status: u16, body: &Value) {
        let reply = Ok(json_response(status, body));
        self.lock().scripted.push_back((route, reply));
    }

    /// Fail the next `route` request with `error`.
    pub fn script_error(&self, route: Route, error: TransportError) {
        self.lock().scripted.push_back((route, Err(error)));
    }

    /// Park the next `route` request until the returned hold is released.
    #[must_use]
    pub fn hold(&self, route: Route) -> Hold {
        let (arrived_tx, arrived_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.lock().parked.push_back(Parked {
            route,
            arrived: arrived_tx,
            release: release_rx,
        });
        Hold {
            arrived: Some(arrived_rx),
            release: release_tx,
        }
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().log.clone()
    }

    /// Requests received for `route`.
    #[must_use]
    pub fn requests_to(&self, route: Route) -> Vec<RecordedRequest> {
        self.lock()
            .log
            .iter()
            .filter(|r| r.route == route)
            .cloned()
            .collect()
    }

    /// Number of requests received for `route`.
    #[must_use]
    pub fn count(&self, route: Route) -> usize {
        self.lock().log.iter().filter(|r| r.route == route).count()
    }

    /// Body of the most recent cart read.
    #[must_use]
    pub fn last_cart_body(&self) -> Option<Vec<u8>> {
        self.lock().last_cart_body.clone()
    }

    /// The cart body the shop would return right now.
    #[must_use]
    pub fn cart_body(&self) -> Vec<u8> {
        self.lock().cart_body()
    }
}

impl Transport for FakeShop {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Reply> {
        let route = Route::of(&request.url);
        let (reply, parked) = {
            let mut shop = self.lock();
            shop.log.push(RecordedRequest {
                method: request.method,
                route,
                url: request.url.clone(),
                authorized: request.bearer.is_some(),
            });
            let reply = shop.respond(&request, route);
            let parked = shop
                .parked
                .iter()
                .position(|p| p.route == route)
                .and_then(|index| shop.parked.remove(index));
            (reply, parked)
        };

        Box::pin(async move {
            if let Some(parked) = parked {
                parked.wait().await;
            }
            reply
        })
    }
}

// =============================================================================
// Simulated backend
// =============================================================================

impl ShopState {
    fn respond(&mut self, request: &ApiRequest, route: Route) -> Reply {
        if self.offline {
            return Err(TransportError::Connect("network unreachable".to_string()));
        }
        if let Some(index) = self.scripted.iter().position(|(r, _)| *r == route)
            && let Some((_, reply)) = self.scripted.remove(index)
        {
            return reply;
        }
        if request.bearer.is_none() && route != Route::Products && route != Route::Categories {
            return Ok(json_response(401, &json!({ "message": "Unauthorized" })));
        }

        let reply = match route {
            Route::Cart => {
                let body = self.cart_body();
                self.last_cart_body = Some(body.clone());
                ApiResponse { status: 200, body }
            }
            Route::CartAction => self.mutate(&request.url),
            Route::Checkout => self.checkout(),
            Route::Products => self.products(&request.url),
            Route::Categories => json_response(200, &fixtures::categories()),
            Route::Other => json_response(404, &json!({ "message": "Not found" })),
        };
        Ok(reply)
    }

    fn product(&self, id: &str) -> Option<&Value> {
        self.catalog
            .iter()
            .find(|p| p.get("_id").and_then(Value::as_str) == Some(id))
    }

    fn cart_body(&self) -> Vec<u8> {
        let mut total = 0_i64;
        let products: Vec<Value> = self
            .lines
            .iter()
            .filter_map(|(id, quantity)| {
                let product = self.product(id)?;
                let price = product.get("price").and_then(Value::as_i64).unwrap_or(0);
                total += price * i64::from(*quantity);
                Some(json!({
                    "product": product,
                    "quantity": quantity,
                    "billingCycle": "oneTime",
                    "_id": format!("entry-{id}"),
                }))
            })
            .collect();

        let eligible = !products.is_empty();
        let cart = json!({
            "_id": CART_ID,
            "user": OWNER_ID,
            "products": products,
            "subtotal": total,
            "tax": 0,
            "discount": 0,
            "total": total,
            "checkout": {
                "isEligible": eligible,
                "reason": if eligible { "" } else { "Your cart is empty" },
            },
        });
        serde_json::to_vec(&cart).unwrap_or_default()
    }

    fn mutate(&mut self, url: &Url) -> ApiResponse {
        let cart_id = url.path_segments().and_then(Iterator::last);
        if cart_id != Some(CART_ID) {
            return json_response(404, &json!({ "message": "Cart not found" }));
        }

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };
        let Some(product_id) = param("productId").filter(|id| self.product(id).is_some()) else {
            return json_response(404, &json!({ "message": "Product not found" }));
        };
        let quantity = param("quantity")
            .and_then(|q| q.parse::<u32>().ok())
            .unwrap_or(0);

        match param("action").as_deref() {
            Some("add") => {
                if let Some(line) = self.lines.iter_mut().find(|(id, _)| *id == product_id) {
                    line.1 += quantity;
                } else if quantity > 0 {
                    self.lines.push((product_id, quantity));
                }
            }
            Some("update") if quantity == 0 => self.lines.retain(|(id, _)| *id != product_id),
            Some("update") => {
                if let Some(line) = self.lines.iter_mut().find(|(id, _)| *id == product_id) {
                    line.1 = quantity;
                } else {
                    self.lines.push((product_id, quantity));
                }
            }
            Some("remove") => self.lines.retain(|(id, _)| *id != product_id),
            _ => return json_response(400, &json!({ "message": "Unknown action" })),
        }

        json_response(200, &json!({ "message": "Cart updated" }))
    }

    fn checkout(&self) -> ApiResponse {
        if self.lines.is_empty() {
            json_response(
                200,
                &json!({ "url": "", "canCheckout": false, "message": "Your cart is empty" }),
            )
        } else {
            json_response(200, &json!({ "url": CHECKOUT_URL, "canCheckout": true }))
        }
    }

    fn products(&self, url: &Url) -> ApiResponse {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };
        let query = param("q").unwrap_or_default().to_lowercase();
        let page: usize = param("page").and_then(|p| p.parse().ok()).unwrap_or(0);
        let limit: usize = param("limit").and_then(|l| l.parse().ok()).unwrap_or(100);

        let matching: Vec<&Value> = self
            .catalog
            .iter()
            .filter(|p| query.is_empty() || label_of(p).to_lowercase().contains(&query))
            .collect();
        let products: Vec<&Value> = matching
            .iter()
            .skip(page * limit)
            .take(limit)
            .copied()
            .collect();

        json_response(
            200,
            &json!({ "products": products, "total": matching.len() }),
        )
    }
}

fn label_of(product: &Value) -> &str {
    product
        .get("label")
        .and_then(|l| l.get("en"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn json_response(status: u16, body: &Value) -> ApiResponse {
    ApiResponse {
        status,
        body: serde_json::to_vec(body).unwrap_or_default(),
    }
}
