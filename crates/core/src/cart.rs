//! Session cart.
//!
//! A [`Cart`] is a plain value: the HTTP boundary loads it from the session,
//! hands it to these operations, and writes it back. Nothing here is global.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::product::Product;
use crate::types::{Price, ProductId};

/// One product in the cart with the name and price captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
}

impl CartLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Something that can tell whether a product still exists.
pub trait Catalog {
    /// Whether `id` resolves to a live product.
    fn contains(&self, id: ProductId) -> bool;
}

impl Catalog for HashSet<ProductId> {
    fn contains(&self, id: ProductId) -> bool {
        HashSet::contains(self, &id)
    }
}

impl Catalog for [Product] {
    fn contains(&self, id: ProductId) -> bool {
        self.iter().any(|p| p.id == id)
    }
}

/// Ordered cart lines, at most one per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add one unit of `product`.
    ///
    /// An existing line for the product has its quantity bumped and keeps its
    /// original price snapshot; otherwise a new line is appended.
    pub fn add(&mut self, product: &Product) -> &mut Self {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            line.quantity = line.quantity.saturating_add(1);
        } else {
            self.lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                quantity: 1,
            });
        }
        self
    }

    /// Drop the line for `product_id`. Absent products are ignored.
    pub fn remove(&mut self, product_id: ProductId) -> &mut Self {
        self.lines.retain(|l| l.product_id != product_id);
        self
    }

    /// Drop every line whose product no longer exists in `catalog`.
    ///
    /// Returns the IDs that were dropped.
    pub fn reconcile<C: Catalog + ?Sized>(&mut self, catalog: &C) -> Vec<ProductId> {
        let mut dropped = Vec::new();
        self.lines.retain(|line| {
            let keep = catalog.contains(line.product_id);
            if !keep {
                dropped.push(line.product_id);
            }
            keep
        });
        dropped
    }

    /// Sum of price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Remove every line.
    pub fn clear(&mut self) -> &mut Self {
        self.lines.clear();
        self
    }

    /// The lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// IDs of every product in the cart.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.lines.iter().map(|l| l.product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i64, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::from_minor_units(cents).unwrap(),
            description: None,
            image: None,
        }
    }

    #[test]
    fn test_adding_same_product_twice_bumps_quantity() {
        let a = product(1, 1000);
        let mut cart = Cart::new();
        cart.add(&a).add(&a);

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_total_matches_example() {
        let a = product(1, 1000);
        let b = product(2, 500);
        let mut cart = Cart::new();
        cart.add(&a).add(&a).add(&b);

        assert_eq!(cart.total(), Price::from_minor_units(2500).unwrap());
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_add_keeps_original_price_snapshot() {
        let mut a = product(1, 1000);
        let mut cart = Cart::new();
        cart.add(&a);
        a.price = Price::from_minor_units(9900).unwrap();
        cart.add(&a);

        assert_eq!(cart.total(), Price::from_minor_units(2000).unwrap());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100));
        let before = cart.clone();
        cart.remove(ProductId::new(99));

        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_drops_whole_line() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100)).add(&product(1, 100)).add(&product(2, 300));
        cart.remove(ProductId::new(1));

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total(), Price::from_minor_units(300).unwrap());
    }

    #[test]
    fn test_reconcile_drops_exactly_missing_products() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100))
            .add(&product(2, 200))
            .add(&product(3, 300));
        let catalog: HashSet<ProductId> = [ProductId::new(1), ProductId::new(3)].into();

        let dropped = cart.reconcile(&catalog);

        assert_eq!(dropped, vec![ProductId::new(2)]);
        let remaining: Vec<_> = cart.product_ids().collect();
        assert_eq!(remaining, vec![ProductId::new(1), ProductId::new(3)]);
    }

    #[test]
    fn test_reconcile_against_product_slice() {
        let products = vec![product(1, 100)];
        let mut cart = Cart::new();
        cart.add(&product(1, 100)).add(&product(5, 100));

        cart.reconcile(products.as_slice());

        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_clear_and_empty_total() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100));
        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_total_is_sum_over_random_sequence() {
        // Deterministic pseudo-random add/remove sequence.
        let products: Vec<Product> = (1..=5).map(|i| product(i, i * 137)).collect();
        let mut cart = Cart::new();
        let mut seed: u64 = 7;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let idx = usize::try_from((seed >> 33) % 5).unwrap();
            if (seed >> 20) % 3 == 0 {
                cart.remove(products[idx].id);
            } else {
                cart.add(&products[idx]);
            }
            let expected: Price = cart
                .lines()
                .iter()
                .map(|l| l.price.times(l.quantity))
                .sum();
            assert_eq!(cart.total(), expected);
            let unique: HashSet<_> = cart.product_ids().collect();
            assert_eq!(unique.len(), cart.line_count());
        }
    }
}
