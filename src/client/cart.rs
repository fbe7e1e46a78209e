//! Storefront cart.
//!
//! Quantities are capped at the stock of the product snapshot the line was
//! added with. The server re-prices and re-checks stock when the order is
//! placed; the subtotal here is only a preview.

use uuid::Uuid;

use crate::domain::models::{NewOrder, NewOrderItem, Product};
use crate::domain::pricing::round_cents;
use crate::domain::validation::{self, ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("{title} is out of stock")]
    OutOfStock { title: String },
    #[error("{title} is not available")]
    NotPublished { title: String },
    #[error("Product is not in the cart")]
    UnknownProduct,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i32,
}

impl CartLine {
    pub fn unit_price(&self) -> f64 {
        self.product.discounted_price()
    }

    pub fn line_total(&self) -> f64 {
        round_cents(self.unit_price() * f64::from(self.quantity))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across lines.
    pub fn item_count(&self) -> i32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> f64 {
        round_cents(self.lines.iter().map(CartLine::line_total).sum())
    }

    /// Add `quantity` units, capped at stock. Returns the quantity now held.
    pub fn add(&mut self, product: &Product, quantity: i32) -> Result<i32, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.is_published {
            return Err(CartError::NotPublished {
                title: product.title.clone(),
            });
        }
        if !product.in_stock() {
            return Err(CartError::OutOfStock {
                title: product.title.clone(),
            });
        }

        let held = match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => {
                line.product = product.clone();
                line.quantity = line.quantity.saturating_add(quantity).min(product.quantity);
                line.quantity
            }
            None => {
                let held = quantity.min(product.quantity);
                self.lines.push(CartLine {
                    product: product.clone(),
                    quantity: held,
                });
                held
            }
        };
        Ok(held)
    }

    /// Zero removes the line. Returns the quantity now held.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: i32) -> Result<i32, CartError> {
        if quantity < 0 {
            return Err(CartError::InvalidQuantity);
        }
        if quantity == 0 {
            self.remove(product_id)?;
            return Ok(0);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product.id == product_id)
            .ok_or(CartError::UnknownProduct)?;
        line.quantity = quantity.min(line.product.quantity);
        Ok(line.quantity)
    }

    pub fn remove(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product.id != product_id);
        if self.lines.len() == before {
            return Err(CartError::UnknownProduct);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Checkout payload. The cart is left as is; clear it once the order
    /// is accepted.
    pub fn to_order(
        &self,
        customer_name: &str,
        customer_email: &str,
        address: &str,
    ) -> Result<NewOrder, ValidationErrors> {
        validation::new_order(NewOrder {
            customer_name: customer_name.to_string(),
            customer_email: customer_email.to_string(),
            address: address.to_string(),
            items: self
                .lines
                .iter()
                .map(|l| NewOrderItem {
                    product_id: l.product.id,
                    quantity: l.quantity,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(title: &str, price: f64, discount: i32, quantity: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            price,
            discount,
            quantity,
            category_id: None,
            is_published: true,
            images: vec![],
            attributes: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_subtotal_uses_discounted_prices() {
        let mut cart = Cart::new();
        cart.add(&product("Desk lamp", 1000.0, 20, 5), 2).unwrap();
        cart.add(&product("Bulb", 2.5, 0, 10), 2).unwrap();
        assert_eq!(cart.subtotal(), 1605.0);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_quantity_is_capped_at_stock() {
        let lamp = product("Desk lamp", 10.0, 0, 3);
        let mut cart = Cart::new();
        assert_eq!(cart.add(&lamp, 2).unwrap(), 2);
        assert_eq!(cart.add(&lamp, 2).unwrap(), 3);
        assert_eq!(cart.set_quantity(lamp.id, 10).unwrap(), 3);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_unavailable_products_are_refused() {
        let mut cart = Cart::new();
        let sold_out = product("Desk lamp", 10.0, 0, 0);
        assert_eq!(
            cart.add(&sold_out, 1).unwrap_err().to_string(),
            "Desk lamp is out of stock"
        );

        let mut hidden = product("Floor lamp", 10.0, 0, 4);
        hidden.is_published = false;
        assert!(matches!(
            cart.add(&hidden, 1),
            Err(CartError::NotPublished { .. })
        ));
        assert_eq!(cart.add(&hidden, 0), Err(CartError::InvalidQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let lamp = product("Desk lamp", 10.0, 0, 3);
        let mut cart = Cart::new();
        cart.add(&lamp, 1).unwrap();
        assert_eq!(cart.set_quantity(lamp.id, 0).unwrap(), 0);
        assert!(cart.is_empty());
        assert_eq!(cart.remove(lamp.id), Err(CartError::UnknownProduct));
    }

    #[test]
    fn test_empty_cart_cannot_check_out() {
        let errors = Cart::new()
            .to_order("Ada", "ada@example.com", "1 Main St")
            .unwrap_err();
        assert_eq!(errors.get("items"), Some("Order must contain at least one item"));
    }

    #[test]
    fn test_order_lists_every_line() {
        let lamp = product("Desk lamp", 10.0, 0, 3);
        let mut cart = Cart::new();
        cart.add(&lamp, 2).unwrap();
        let order = cart
            .to_order(" Ada ", "ADA@example.com", "1 Main St")
            .unwrap();
        assert_eq!(order.customer_name, "Ada");
        assert_eq!(order.customer_email, "ada@example.com");
        assert_eq!(order.items, vec![NewOrderItem { product_id: lamp.id, quantity: 2 }]);
    }
}
