//! Discount pricing.

/// Round to two decimal places.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Price after applying a percentage discount. Discounts outside 0..=100 are
/// clamped.
pub fn discounted_price(price: f64, discount: i32) -> f64 {
    let discount = discount.clamp(0, 100);
    if discount == 0 {
        return price;
    }
    round_cents(price * f64::from(100 - discount) / 100.0)
}

/// Badge text such as "20% off", or `None` when there is no discount.
pub fn discount_badge(discount: i32) -> Option<String> {
    let discount = discount.clamp(0, 100);
    (discount > 0).then(|| format!("{}% off", discount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_percent_off_thousand_is_eight_hundred() {
        assert_eq!(discounted_price(1000.0, 20), 800.0);
        assert_eq!(discount_badge(20).as_deref(), Some("20% off"));
    }

    #[test]
    fn test_zero_discount_keeps_price_and_hides_badge() {
        assert_eq!(discounted_price(1000.0, 0), 1000.0);
        assert_eq!(discount_badge(0), None);
    }

    #[test]
    fn test_discount_is_clamped() {
        assert_eq!(discounted_price(50.0, 150), 0.0);
        assert_eq!(discounted_price(50.0, -5), 50.0);
        assert_eq!(discount_badge(-5), None);
    }

    #[test]
    fn test_fractional_prices_round_to_cents() {
        assert_eq!(discounted_price(19.99, 15), 16.99);
    }
}
