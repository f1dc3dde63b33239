//! Observable cart state published by the coordinator.

use cynapp_core::{Cart, CartId, CartLine, CheckoutEligibility, Price, ProductId, UserId, subtotal};

/// Server-computed aggregates from the latest applied cart response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartTotals {
    pub cart_id: CartId,
    pub owner: Option<UserId>,
    pub subtotal: Price,
    pub tax: Price,
    pub discount: Price,
    pub total: Price,
    pub checkout: CheckoutEligibility,
}

impl CartTotals {
    fn from_cart(cart: &Cart) -> Self {
        Self {
            cart_id: cart.id.clone(),
            owner: cart.user.clone(),
            subtotal: cart.subtotal,
            tax: cart.tax,
            discount: cart.discount,
            total: cart.total,
            checkout: cart.checkout.clone(),
        }
    }
}

/// Snapshot of everything the UI renders for the cart.
///
/// Lines only ever hold the bootstrap snapshot or the latest server-confirmed
/// cart; user intent never edits them directly.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    lines: Vec<CartLine>,
    totals: Option<CartTotals>,
    in_flight: Vec<ProductId>,
    pending_refreshes: u32,
    /// Highest refresh ticket handed out.
    issued_seq: u64,
    /// Ticket of the last response applied to `lines`.
    applied_seq: u64,
}

impl CartState {
    /// Lines in server order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Aggregates from the server, absent until a cart has been seen.
    #[must_use]
    pub const fn totals(&self) -> Option<&CartTotals> {
        self.totals.as_ref()
    }

    /// Whether a cart refresh is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending_refreshes > 0
    }

    /// The product whose mutation was admitted most recently and has not
    /// completed yet.
    #[must_use]
    pub fn updating_product_id(&self) -> Option<&ProductId> {
        self.in_flight.last()
    }

    /// Every product with a mutation in flight, in admission order.
    #[must_use]
    pub fn in_flight(&self) -> &[ProductId] {
        &self.in_flight
    }

    /// Whether `product_id` has a mutation in flight.
    #[must_use]
    pub fn is_updating(&self, product_id: &ProductId) -> bool {
        self.in_flight.contains(product_id)
    }

    /// The line for `product_id`, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product.id == product_id)
    }

    /// Displayed quantity for `product_id` (zero when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.line(product_id).map_or(0, |l| l.quantity)
    }

    /// Local `unit price x quantity` sum; the server total is authoritative.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        subtotal(&self.lines)
    }

    /// Total units displayed.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Whether no lines are displayed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    // -------------------------------------------------------------------------
    // Mutators used by the coordinator
    // -------------------------------------------------------------------------

    /// Mark `product_id` in flight unless it already is.
    pub(crate) fn try_admit(&mut self, product_id: &ProductId) -> bool {
        if self.is_updating(product_id) {
            return false;
        }
        self.in_flight.push(product_id.clone());
        true
    }

    pub(crate) fn release(&mut self, product_id: &ProductId) -> bool {
        let before = self.in_flight.len();
        self.in_flight.retain(|id| id != product_id);
        before != self.in_flight.len()
    }

    /// Hand out a refresh ticket and count the refresh as pending.
    pub(crate) fn begin_refresh(&mut self) -> u64 {
        self.issued_seq += 1;
        self.pending_refreshes += 1;
        self.issued_seq
    }

    pub(crate) fn end_refresh(&mut self) {
        self.pending_refreshes = self.pending_refreshes.saturating_sub(1);
    }

    /// Apply a server cart if `ticket` is newer than what is displayed.
    pub(crate) fn apply(&mut self, ticket: u64, cart: &Cart) -> bool {
        if ticket <= self.applied_seq {
            return false;
        }
        self.applied_seq = ticket;
        self.lines = cart.lines();
        self.totals = Some(CartTotals::from_cart(cart));
        true
    }

    /// Seed from the persisted snapshot unless a server response already
    /// landed.
    pub(crate) fn seed(&mut self, cart: &Cart) -> bool {
        if self.applied_seq > 0 {
            return false;
        }
        self.lines = cart.lines();
        self.totals = Some(CartTotals::from_cart(cart));
        true
    }

    /// Empty the lines and invalidate every refresh issued so far.
    pub(crate) fn clear(&mut self) {
        self.lines.clear();
        self.totals = None;
        self.applied_seq = self.issued_seq;
    }
}
