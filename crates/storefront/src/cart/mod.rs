//! Cart coordinator.
//!
//! Keeps the displayed cart consistent with the server-owned cart.
//!
//! # Architecture
//!
//! - State lives in a `tokio::sync::watch` channel; UIs call
//!   [`CartCoordinator::subscribe`] and redraw on change.
//! - Every mutation passes a per-product single-flight gate. Admission is an
//!   atomic check-and-set on the watch value and returns a guard that
//!   releases the product on drop, so every completion path (including a
//!   dropped future) clears it.
//! - Mutation responses are never applied directly. A 2xx triggers a full
//!   [`refresh`](CartCoordinator::refresh); refresh responses carry a ticket
//!   and only a response newer than the displayed one is applied.
//! - Failures are returned to the caller and also published as a [`Notice`]
//!   so passive views can show a transient message.

mod intent;
mod state;

use std::sync::{Arc, Mutex, PoisonError};

use cynapp_core::{Cart, Price, Product, ProductId};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{Span, debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::http::{ApiClient, ApiError, Method};
use crate::snapshot::CartSnapshotCache;
use crate::store::StoreError;

pub use intent::{CartAction, ProductSelection};
pub use state::{CartState, CartTotals};

const CART_PATH: &str = "api/shop/cart";
const NOTICE_CAPACITY: usize = 32;

// =============================================================================
// Errors and Events
// =============================================================================

/// Errors from cart operations. None of them leave the state corrupted.
#[derive(Debug, Error)]
pub enum CartError {
    /// No bearer token is stored.
    #[error("not logged in")]
    Unauthenticated,

    /// No cart id is known yet (no successful refresh or snapshot).
    #[error("no cart id known")]
    MissingCartId,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CartError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please log in to use your cart".to_string(),
            Self::MissingCartId => "Your cart is not available yet".to_string(),
            Self::Api(e) => e.user_message(),
            Self::Store(_) => "Something went wrong".to_string(),
        }
    }
}

/// Transient, non-fatal events for passive observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A cart mutation failed; state was left untouched.
    MutationFailed {
        product_id: ProductId,
        message: String,
    },
    /// A cart refresh failed; the previous lines remain visible.
    RefreshFailed { message: String },
    /// A product-details add was confirmed by the server.
    AddedToCart {
        product_id: ProductId,
        quantity: u32,
    },
}

/// How an admitted (or rejected) mutation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Another mutation for the same product was in flight.
    Dropped,
    /// Nothing needed to be sent.
    NoOp,
    /// The server accepted the mutation.
    Confirmed,
}

/// What a completed cart read did to the displayed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refreshed {
    /// The response became the displayed cart and was persisted.
    Applied,
    /// A newer response was already displayed (or the lines were cleared
    /// since this read started); nothing was applied or persisted.
    Superseded,
}

// =============================================================================
// CartCoordinator
// =============================================================================

/// Owner of the observable cart state.
///
/// Cheap to clone; all clones drive the same state.
#[derive(Clone)]
pub struct CartCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    api: ApiClient,
    snapshot: CartSnapshotCache,
    state: watch::Sender<CartState>,
    notices: broadcast::Sender<Notice>,
    /// Serializes "apply response + persist snapshot" so the stored bytes
    /// always match the displayed cart.
    commit: Mutex<()>,
}

impl std::fmt::Debug for CartCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCoordinator")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Holds a product's single-flight slot until dropped.
struct GateGuard {
    inner: Arc<CoordinatorInner>,
    product_id: ProductId,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        let product_id = &self.product_id;
        self.inner
            .state
            .send_if_modified(|state| state.release(product_id));
        debug!(product_id = %product_id, "Released cart gate");
    }
}

/// Decrements the pending-refresh count on drop.
struct RefreshGuard<'a> {
    state: &'a watch::Sender<CartState>,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(CartState::end_refresh);
    }
}

impl CartCoordinator {
    /// Create a coordinator with empty state.
    #[must_use]
    pub fn new(api: ApiClient, snapshot: CartSnapshotCache) -> Self {
        let (state, _) = watch::channel(CartState::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(CoordinatorInner {
                api,
                snapshot,
                state,
                notices,
                commit: Mutex::new(()),
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Receive transient notices.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// The most recently admitted product still in flight.
    #[must_use]
    pub fn updating_product_id(&self) -> Option<ProductId> {
        self.inner.state.borrow().updating_product_id().cloned()
    }

    /// Local sum of `unit price x quantity` over the displayed lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.inner.state.borrow().subtotal()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Seed the lines from the persisted snapshot, then refresh if a token
    /// is stored.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the store cannot be read or the refresh fails.
    /// Snapshot lines stay visible in either case.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<(), CartError> {
        if let Some(snapshot) = self.inner.snapshot.load_cart()? {
            let seeded = self
                .inner
                .state
                .send_if_modified(|state| state.seed(&snapshot.cart));
            if seeded {
                info!(
                    cart_id = %snapshot.cart.id,
                    lines = snapshot.cart.lines().len(),
                    "Seeded cart from snapshot"
                );
            }
            self.inner.api.credentials().set_cart_id(&snapshot.cart.id)?;
        }

        if self.inner.api.credentials().token()?.is_some() {
            self.refresh().await?;
            Ok(())
        } else {
            debug!("No token stored, skipping cart refresh");
            Ok(())
        }
    }

    /// Re-read the server cart and make it the displayed state.
    ///
    /// When the response is applied its raw body is persisted as the
    /// snapshot and the cart id is recorded. A response older than one
    /// already displayed is dropped and reported as
    /// [`Refreshed::Superseded`].
    ///
    /// # Errors
    ///
    /// Returns `CartError` on missing token, transport, status or decode
    /// failure. The displayed lines are left untouched.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Refreshed, CartError> {
        if self.inner.api.credentials().token()?.is_none() {
            return Err(CartError::Unauthenticated);
        }

        let mut ticket = 0;
        self.inner
            .state
            .send_modify(|state| ticket = state.begin_refresh());
        let _loading = RefreshGuard {
            state: &self.inner.state,
        };

        let result = self.fetch_and_apply(ticket).await;
        if let Err(e) = &result {
            warn!(error = %e, ticket, "Cart refresh failed");
            self.publish(Notice::RefreshFailed {
                message: e.user_message(),
            });
        }
        result
    }

    async fn fetch_and_apply(&self, ticket: u64) -> Result<Refreshed, CartError> {
        let response = self
            .inner
            .api
            .request_ok(Method::Get, CART_PATH, &[], None)
            .await?;

        let cart = Cart::from_slice(&response.body).map_err(|e| {
            error!(error = %e, "Failed to decode cart");
            ApiError::Decode(e.to_string())
        })?;

        let _commit = self
            .inner
            .commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let applied = self
            .inner
            .state
            .send_if_modified(|state| state.apply(ticket, &cart));

        if applied {
            self.inner.snapshot.save(&response.body)?;
            self.inner.api.credentials().set_cart_id(&cart.id)?;
            info!(cart_id = %cart.id, lines = cart.products.len(), ticket, "Cart refreshed");
            Ok(Refreshed::Applied)
        } else {
            debug!(ticket, "Discarding stale cart response");
            Ok(Refreshed::Superseded)
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply a `+n`/`-n` tap on `product`.
    ///
    /// Positive deltas send `add` with quantity 1; negative deltas send an
    /// absolute `update`, or `remove` when the line would reach zero.
    ///
    /// # Errors
    ///
    /// Returns `CartError` when not logged in, no cart id is known, or the
    /// request fails. The gate is released in every case.
    #[instrument(
        skip(self, product),
        fields(product_id = %product.id, mutation_id = tracing::field::Empty)
    )]
    pub async fn apply_delta(&self, product: &Product, delta: i32) -> Result<Mutation, CartError> {
        let Some((guard, current)) = self.admit(&product.id) else {
            return Ok(Mutation::Dropped);
        };

        let action = CartAction::plan(current, delta);
        if action == CartAction::NoOp {
            debug!(current, delta, "Nothing to send");
            return Ok(Mutation::NoOp);
        }

        self.run_admitted(guard, action).await
    }

    /// Remove `product`'s line.
    ///
    /// # Errors
    ///
    /// As [`apply_delta`](Self::apply_delta).
    #[instrument(
        skip(self, product),
        fields(product_id = %product.id, mutation_id = tracing::field::Empty)
    )]
    pub async fn remove(&self, product: &Product) -> Result<Mutation, CartError> {
        let Some((guard, _)) = self.admit(&product.id) else {
            return Ok(Mutation::Dropped);
        };
        self.run_admitted(guard, CartAction::Remove).await
    }

    /// Add `quantity` units from the product-details screen in one request.
    ///
    /// Shares the single-flight gate with [`apply_delta`](Self::apply_delta).
    ///
    /// # Errors
    ///
    /// As [`apply_delta`](Self::apply_delta).
    #[instrument(
        skip(self, product),
        fields(product_id = %product.id, mutation_id = tracing::field::Empty)
    )]
    pub async fn add_from_details(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<Mutation, CartError> {
        if quantity == 0 {
            return Ok(Mutation::NoOp);
        }
        let Some((guard, _)) = self.admit(&product.id) else {
            return Ok(Mutation::Dropped);
        };

        let outcome = self
            .run_admitted(guard, CartAction::Add { quantity })
            .await?;
        if outcome == Mutation::Confirmed {
            self.publish(Notice::AddedToCart {
                product_id: product.id.clone(),
                quantity,
            });
        }
        Ok(outcome)
    }

    /// Empty the displayed lines without touching the server.
    ///
    /// Any refresh already in flight is invalidated so it cannot re-show the
    /// cleared lines.
    pub fn clear_lines(&self) {
        self.inner.state.send_modify(CartState::clear);
        debug!("Cleared cart lines");
    }

    /// Try to take the single-flight slot for `product_id`.
    ///
    /// Returns the guard and the quantity displayed at admission time.
    fn admit(&self, product_id: &ProductId) -> Option<(GateGuard, u32)> {
        let mut current = 0;
        let admitted = self.inner.state.send_if_modified(|state| {
            let admitted = state.try_admit(product_id);
            if admitted {
                current = state.quantity_of(product_id);
            }
            admitted
        });

        if !admitted {
            warn!(product_id = %product_id, "Mutation already in flight, dropping tap");
            return None;
        }

        let mutation_id = Uuid::new_v4();
        Span::current().record("mutation_id", tracing::field::display(mutation_id));
        debug!(current, "Admitted cart mutation");

        Some((
            GateGuard {
                inner: Arc::clone(&self.inner),
                product_id: product_id.clone(),
            },
            current,
        ))
    }

    /// Send `action` for the admitted product, then refresh on success.
    ///
    /// The gate is released as soon as the mutation response arrives, before
    /// the follow-up refresh is issued.
    async fn run_admitted(&self, guard: GateGuard, action: CartAction) -> Result<Mutation, CartError> {
        let product_id = guard.product_id.clone();

        let result = self.send_action(&product_id, action).await;
        drop(guard);
        match result {
            Ok(()) => {
                // A failed follow-up refresh has already been published.
                let _ = self.refresh().await;
                Ok(Mutation::Confirmed)
            }
            Err(e) => {
                warn!(error = %e, action = ?action, "Cart mutation failed");
                self.publish(Notice::MutationFailed {
                    product_id,
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    async fn send_action(&self, product_id: &ProductId, action: CartAction) -> Result<(), CartError> {
        let credentials = self.inner.api.credentials();
        if credentials.token()?.is_none() {
            return Err(CartError::Unauthenticated);
        }
        let cart_id = credentials.cart_id()?.ok_or(CartError::MissingCartId)?;

        let pairs = action.query(product_id);
        let query: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let path = format!("{CART_PATH}/{cart_id}");

        self.inner
            .api
            .request_ok(Method::Get, &path, &query, None)
            .await?;

        info!(cart_id = %cart_id, action = ?action, "Cart mutation accepted");
        Ok(())
    }

    fn publish(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.inner.notices.send(notice);
    }
}
