//! Translation of user intent into server cart actions.
//!
//! The server has two write modes: `add` increments by the given quantity and
//! `update` sets an absolute quantity. Taps always send `add` with `1`, while
//! decrements send the absolute target, so repeated taps stay monotonic.

use cynapp_core::ProductId;

/// A cart action as understood by `GET cart/<id>?action=...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    /// Increment by `quantity`.
    Add { quantity: u32 },
    /// Set the line to `quantity` (absolute).
    Update { quantity: u32 },
    /// Drop the line.
    Remove,
    /// Nothing to send.
    NoOp,
}

impl CartAction {
    /// Plan the action for a `delta` tap on a line currently at `current`.
    #[must_use]
    pub fn plan(current: u32, delta: i32) -> Self {
        match delta.signum() {
            0 => Self::NoOp,
            1 => Self::Add { quantity: 1 },
            _ if current == 0 => Self::NoOp,
            _ => {
                let target = i64::from(current) + i64::from(delta);
                match u32::try_from(target) {
                    Ok(quantity) if quantity > 0 => Self::Update { quantity },
                    _ => Self::Remove,
                }
            }
        }
    }

    /// Value of the `action` query parameter.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::Add { .. } => Some("add"),
            Self::Update { .. } => Some("update"),
            Self::Remove => Some("remove"),
            Self::NoOp => None,
        }
    }

    /// Query pairs in wire order: `action`, `quantity`, `productId`.
    #[must_use]
    pub fn query(self, product_id: &ProductId) -> Vec<(&'static str, String)> {
        let Some(name) = self.name() else {
            return Vec::new();
        };

        let mut pairs = vec![("action", name.to_string())];
        match self {
            Self::Add { quantity } | Self::Update { quantity } => {
                pairs.push(("quantity", quantity.to_string()));
            }
            Self::Remove | Self::NoOp => {}
        }
        pairs.push(("productId", product_id.as_str().to_string()));
        pairs
    }
}

/// Quantity stepper for the product-details screen.
///
/// Starts at one and never goes below one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSelection {
    quantity: u32,
}

impl Default for ProductSelection {
    fn default() -> Self {
        Self { quantity: 1 }
    }
}

impl ProductSelection {
    /// A fresh selection of one unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current quantity.
    #[must_use]
    pub const fn quantity(self) -> u32 {
        self.quantity
    }

    /// Step up by one.
    pub const fn increment(&mut self) {
        self.quantity = self.quantity.saturating_add(1);
    }

    /// Step down by one, stopping at one.
    pub const fn decrement(&mut self) {
        if self.quantity > 1 {
            self.quantity -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_delta_always_adds_one() {
        assert_eq!(CartAction::plan(0, 1), CartAction::Add { quantity: 1 });
        assert_eq!(CartAction::plan(7, 1), CartAction::Add { quantity: 1 });
        assert_eq!(CartAction::plan(2, 5), CartAction::Add { quantity: 1 });
    }

    #[test]
    fn test_negative_delta() {
        assert_eq!(CartAction::plan(3, -1), CartAction::Update { quantity: 2 });
        assert_eq!(CartAction::plan(5, -3), CartAction::Update { quantity: 2 });
        assert_eq!(CartAction::plan(1, -1), CartAction::Remove);
        assert_eq!(CartAction::plan(2, -9), CartAction::Remove);
        assert_eq!(CartAction::plan(0, -1), CartAction::NoOp);
        assert_eq!(CartAction::plan(4, i32::MIN), CartAction::Remove);
    }

    #[test]
    fn test_zero_delta_is_noop() {
        assert_eq!(CartAction::plan(3, 0), CartAction::NoOp);
    }

    #[test]
    fn test_query_order() {
        let id = ProductId::new("A");
        let pairs = CartAction::Add { quantity: 1 }.query(&id);
        assert_eq!(
            pairs,
            vec![
                ("action", "add".to_string()),
                ("quantity", "1".to_string()),
                ("productId", "A".to_string()),
            ]
        );

        let pairs = CartAction::Remove.query(&id);
        assert_eq!(
            pairs,
            vec![("action", "remove".to_string()), ("productId", "A".to_string())]
        );
        assert!(CartAction::NoOp.query(&id).is_empty());
    }

    #[test]
    fn test_selection_floor() {
        let mut selection = ProductSelection::new();
        selection.decrement();
        assert_eq!(selection.quantity(), 1);
        selection.increment();
        selection.increment();
        assert_eq!(selection.quantity(), 3);
        selection.decrement();
        assert_eq!(selection.quantity(), 2);
    }
}
