//! Session-backed shopping cart.
//!
//! The session stores only product ids and quantities. Prices, names, and
//! stock come from the database every time the cart is shown, so a cart
//! never displays a stale price.

use serde::{Deserialize, Serialize};

use buildmart_core::{Money, OrderLine, ProductId};
use buildmart_shop::models::{NewOrderItem, Product, order::MAX_LINE_QUANTITY};

/// One line of the session cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// The cart as stored in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCart {
    pub lines: Vec<CartLine>,
}

/// Cap a requested quantity at available stock and the per-line maximum.
#[must_use]
pub fn cap_quantity(requested: u32, available: i32) -> u32 {
    let available = u32::try_from(available).unwrap_or(0);
    requested.min(available).min(MAX_LINE_QUANTITY)
}

impl SessionCart {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.quantity)
    }

    /// Add units of a product, merging with an existing line. Returns the
    /// line's quantity after capping, or 0 if nothing could be added.
    pub fn add(&mut self, product_id: ProductId, quantity: u32, available: i32) -> u32 {
        let wanted = self.quantity_of(product_id).saturating_add(quantity);
        self.set_quantity(product_id, wanted, available)
    }

    /// Set a line's quantity. Zero, or a capped result of zero, removes the
    /// line. Returns the stored quantity.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32, available: i32) -> u32 {
        let capped = cap_quantity(quantity, available);
        if capped == 0 {
            self.remove(product_id);
            return 0;
        }
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = capped,
            None => self.lines.push(CartLine {
                product_id,
                quantity: capped,
            }),
        }
        capped
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    #[must_use]
    pub fn order_items(&self) -> Vec<NewOrderItem> {
        self.lines
            .iter()
            .map(|l| NewOrderItem {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect()
    }

    /// Price the cart against current product rows.
    ///
    /// Lines whose product is missing, inactive, or out of stock are dropped;
    /// quantities above current stock are lowered. The returned flag tells
    /// whether the stored cart changed and should be saved back.
    #[must_use]
    pub fn resolve(&self, products: &[Product]) -> (CartView, Self, bool) {
        let mut kept = Self::default();
        let mut items = Vec::with_capacity(self.lines.len());

        for line in &self.lines {
            let Some(product) = products
                .iter()
                .find(|p| p.id == line.product_id && p.is_purchasable())
            else {
                continue;
            };
            let quantity = cap_quantity(line.quantity, product.stock_quantity);
            if quantity == 0 {
                continue;
            }
            kept.lines.push(CartLine {
                product_id: product.id,
                quantity,
            });
            items.push(CartItem::new(product, quantity));
        }

        let changed = kept != *self;
        (CartView::new(items), kept, changed)
    }
}

/// A cart line priced against the current product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub unit: String,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    pub stock_quantity: i32,
}

impl CartItem {
    fn new(product: &Product, quantity: u32) -> Self {
        let line = OrderLine {
            unit_price: product.price,
            quantity,
        };
        Self {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            sku: product.sku.clone(),
            unit: product.unit.clone(),
            image_url: product.images.first().cloned(),
            unit_price: product.price,
            quantity,
            line_total: line.line_total(),
            stock_quantity: product.stock_quantity,
        }
    }
}

/// The priced cart returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub item_count: u32,
    pub subtotal: Money,
}

impl CartView {
    fn new(items: Vec<CartItem>) -> Self {
        let item_count = items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity));
        let subtotal = items.iter().map(|item| item.line_total).sum();
        Self {
            items,
            item_count,
            subtotal,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use buildmart_core::CategoryId;
    use chrono::Utc;

    fn product(id: i32, cents: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            sku: format!("SKU-{id}"),
            description: None,
            price: Money::from_cents(cents),
            compare_at_price: None,
            unit: "each".to_owned(),
            stock_quantity: stock,
            category_id: CategoryId::new(1),
            product_type_id: None,
            images: vec![format!("/images/{id}.jpg")],
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    // =========================================================================
    // Quantity rules
    // =========================================================================

    #[test]
    fn test_cap_quantity() {
        assert_eq!(cap_quantity(5, 10), 5);
        assert_eq!(cap_quantity(15, 10), 10);
        assert_eq!(cap_quantity(5_000, 10_000), MAX_LINE_QUANTITY);
        assert_eq!(cap_quantity(3, 0), 0);
        assert_eq!(cap_quantity(3, -4), 0);
    }

    #[test]
    fn test_add_merges_and_caps_at_stock() {
        let mut cart = SessionCart::default();
        let id = ProductId::new(1);
        assert_eq!(cart.add(id, 4, 6), 4);
        assert_eq!(cart.add(id, 4, 6), 6);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.count(), 6);
    }

    #[test]
    fn test_add_out_of_stock_adds_nothing() {
        let mut cart = SessionCart::default();
        assert_eq!(cart.add(ProductId::new(1), 2, 0), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = SessionCart::default();
        let id = ProductId::new(1);
        cart.add(id, 2, 10);
        cart.add(ProductId::new(2), 1, 10);
        assert_eq!(cart.set_quantity(id, 0, 10), 0);
        assert_eq!(cart.product_ids(), vec![ProductId::new(2)]);
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), 1, 10);
        assert!(cart.remove(ProductId::new(1)));
        assert!(!cart.remove(ProductId::new(1)));
    }

    // =========================================================================
    // Resolution against current products
    // =========================================================================

    #[test]
    fn test_resolve_prices_lines() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), 3, 100);
        cart.add(ProductId::new(2), 1, 100);

        let products = vec![product(1, 1_299, 100), product(2, 45_000, 100)];
        let (view, kept, changed) = cart.resolve(&products);

        assert!(!changed);
        assert_eq!(kept, cart);
        assert_eq!(view.item_count, 4);
        assert_eq!(view.subtotal, Money::from_cents(3 * 1_299 + 45_000));
        assert_eq!(view.items[0].line_total, Money::from_cents(3_897));
        assert_eq!(view.items[0].image_url.as_deref(), Some("/images/1.jpg"));
    }

    #[test]
    fn test_resolve_drops_missing_and_inactive_products() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), 1, 10);
        cart.add(ProductId::new(2), 1, 10);
        cart.add(ProductId::new(3), 1, 10);

        let mut inactive = product(2, 500, 10);
        inactive.is_active = false;
        let products = vec![product(1, 500, 10), inactive];

        let (view, kept, changed) = cart.resolve(&products);
        assert!(changed);
        assert_eq!(kept.product_ids(), vec![ProductId::new(1)]);
        assert_eq!(view.items.len(), 1);
    }

    #[test]
    fn test_resolve_lowers_quantity_to_current_stock() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), 8, 10);

        let (view, kept, changed) = cart.resolve(&[product(1, 100, 5)]);
        assert!(changed);
        assert_eq!(kept.quantity_of(ProductId::new(1)), 5);
        assert_eq!(view.subtotal, Money::from_cents(500));
    }

    #[test]
    fn test_order_items_mirror_lines() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(7), 2, 10);
        let items = cart.order_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, ProductId::new(7));
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::empty();
        assert_eq!(view.item_count, 0);
        assert_eq!(view.subtotal, Money::ZERO);
    }
}
