//! Payload validation shared by the client forms and the API handlers.
//!
//! Forms run these before submitting so an invalid payload never reaches the
//! network; handlers run them again because the client cannot be trusted.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

use super::models::{
    ChangePasswordRequest, NewCategory, NewOrder, NewProduct, NewReview, NewUser, ProductUpdate,
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_ORDER_LINES: usize = 100;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
}

/// Field name to message, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first message recorded for a field.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, field: &'static str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.fields.values().map(String::as_str).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Field rules
// ============================================================================

pub fn required(label: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", label))
    } else {
        Ok(())
    }
}

pub fn title(value: &str) -> Result<(), String> {
    required("Title", value)?;
    if value.trim().chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title must be at most {} characters", MAX_TITLE_LEN));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), String> {
    required("Email", value)?;
    if !EMAIL_REGEX.is_match(value.trim()) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), String> {
    required("Password", value)?;
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

pub fn price(value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err("Price must be a non-negative number".to_string());
    }
    Ok(())
}

pub fn discount(value: i32) -> Result<(), String> {
    if !(0..=100).contains(&value) {
        return Err("Discount must be between 0 and 100".to_string());
    }
    Ok(())
}

pub fn quantity(value: i32) -> Result<(), String> {
    if value < 0 {
        return Err("Quantity cannot be negative".to_string());
    }
    Ok(())
}

pub fn rating(value: i32) -> Result<(), String> {
    if !(1..=5).contains(&value) {
        return Err("Rating must be between 1 and 5".to_string());
    }
    Ok(())
}

// ============================================================================
// Payload rules
// ============================================================================

/// Trims the title.
pub fn new_category(payload: NewCategory) -> Result<NewCategory, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("title", title(&payload.title));
    errors.finish(NewCategory {
        title: payload.title.trim().to_string(),
    })
}

pub fn new_product(mut payload: NewProduct) -> Result<NewProduct, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("title", title(&payload.title));
    errors.check("price", price(payload.price));
    errors.check("discount", discount(payload.discount));
    errors.check("quantity", quantity(payload.quantity));
    if !payload.attributes.is_null() && !payload.attributes.is_object() {
        errors.add("attributes", "Attributes must be an object");
    }
    payload.title = payload.title.trim().to_string();
    errors.finish(payload)
}

pub fn product_update(mut payload: ProductUpdate) -> Result<ProductUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(value) = &payload.title {
        errors.check("title", title(value));
    }
    if let Some(value) = payload.price {
        errors.check("price", price(value));
    }
    if let Some(value) = payload.discount {
        errors.check("discount", discount(value));
    }
    if let Some(value) = payload.quantity {
        errors.check("quantity", quantity(value));
    }
    if let Some(value) = &payload.attributes {
        if !value.is_null() && !value.is_object() {
            errors.add("attributes", "Attributes must be an object");
        }
    }
    payload.title = payload.title.map(|t| t.trim().to_string());
    errors.finish(payload)
}

pub fn new_review(mut payload: NewReview) -> Result<NewReview, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("customerName", required("Name", &payload.customer_name));
    errors.check("rating", rating(payload.rating));
    errors.check("comment", required("Comment", &payload.comment));
    payload.customer_name = payload.customer_name.trim().to_string();
    payload.comment = payload.comment.trim().to_string();
    errors.finish(payload)
}

pub fn new_user(mut payload: NewUser) -> Result<NewUser, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("name", required("Name", &payload.name));
    errors.check("email", email(&payload.email));
    errors.check("password", password(&payload.password));
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();
    errors.finish(payload)
}

pub fn new_order(mut payload: NewOrder) -> Result<NewOrder, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("customerName", required("Name", &payload.customer_name));
    errors.check("customerEmail", email(&payload.customer_email));
    errors.check("address", required("Address", &payload.address));
    if payload.items.is_empty() {
        errors.add("items", "Order must contain at least one item");
    } else if payload.items.len() > MAX_ORDER_LINES {
        errors.add("items", format!("Order cannot exceed {} lines", MAX_ORDER_LINES));
    } else if payload.items.iter().any(|item| item.quantity < 1) {
        errors.add("items", "Item quantity must be at least 1");
    }
    payload.customer_name = payload.customer_name.trim().to_string();
    payload.customer_email = payload.customer_email.trim().to_lowercase();
    payload.address = payload.address.trim().to_string();
    errors.finish(payload)
}

pub fn password_change(
    payload: ChangePasswordRequest,
) -> Result<ChangePasswordRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check(
        "currentPassword",
        required("Current password", &payload.current_password),
    );
    errors.check("newPassword", password(&payload.new_password));
    if !payload.current_password.is_empty() && payload.current_password == payload.new_password {
        errors.add(
            "newPassword",
            "New password must differ from the current password",
        );
    }
    errors.finish(payload)
}
