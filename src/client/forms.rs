//! Form state as typed by the user, turned into request payloads.
//!
//! Numeric inputs arrive as text. Each form parses its fields, runs the
//! shared payload rules, and reports every problem at once keyed by field.

use uuid::Uuid;

use super::api::{ImageUpload, ProfileChanges};
use crate::domain::models::{
    ChangePasswordRequest, NewCategory, NewProduct, NewReview, NewUser, Product, ProductUpdate,
    Role,
};
use crate::domain::validation::{self, ValidationErrors};

fn parse_price(errors: &mut ValidationErrors, raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            errors.add("price", "Price must be a number");
            0.0
        }
    }
}

/// Blank means zero.
fn parse_whole(errors: &mut ValidationErrors, field: &'static str, label: &str, raw: &str) -> i32 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    match raw.parse::<i32>() {
        Ok(value) => value,
        Err(_) => {
            errors.add(field, format!("{} must be a whole number", label));
            0
        }
    }
}

fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Rules already failed by parsing keep their parse message.
fn merge(mut parsed: ValidationErrors, rules: ValidationErrors) -> ValidationErrors {
    for (field, message) in rules.fields() {
        parsed.add(field, message);
    }
    parsed
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductForm {
    pub title: String,
    pub description: String,
    pub price: String,
    pub discount: String,
    pub quantity: String,
    pub category_id: Option<Uuid>,
    pub is_published: bool,
    pub images: Vec<String>,
}

impl ProductForm {
    /// Prefilled for editing.
    pub fn from_product(product: &Product) -> Self {
        Self {
            title: product.title.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: product.price.to_string(),
            discount: product.discount.to_string(),
            quantity: product.quantity.to_string(),
            category_id: product.category_id,
            is_published: product.is_published,
            images: product.images.clone(),
        }
    }

    pub fn to_new_product(&self) -> Result<NewProduct, ValidationErrors> {
        let mut parsed = ValidationErrors::new();
        let price = parse_price(&mut parsed, &self.price);
        let discount = parse_whole(&mut parsed, "discount", "Discount", &self.discount);
        let quantity = parse_whole(&mut parsed, "quantity", "Quantity", &self.quantity);

        let payload = NewProduct {
            title: self.title.clone(),
            description: optional_text(&self.description),
            price,
            discount,
            quantity,
            category_id: self.category_id,
            is_published: self.is_published,
            images: self.images.clone(),
            attributes: serde_json::Value::Null,
        };
        match validation::new_product(payload) {
            Ok(payload) => parsed.finish(payload),
            Err(rules) => Err(merge(parsed, rules)),
        }
    }

    /// Every field is sent, so the update replaces the whole record.
    pub fn to_update(&self) -> Result<ProductUpdate, ValidationErrors> {
        let product = self.to_new_product()?;
        Ok(ProductUpdate {
            title: Some(product.title),
            description: product.description,
            price: Some(product.price),
            discount: Some(product.discount),
            quantity: Some(product.quantity),
            category_id: product.category_id,
            is_published: Some(product.is_published),
            images: Some(product.images),
            attributes: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryForm {
    pub title: String,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<NewCategory, ValidationErrors> {
        validation::new_category(NewCategory {
            title: self.title.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewForm {
    pub product_id: Uuid,
    pub customer_name: String,
    pub rating: i32,
    pub comment: String,
}

impl ReviewForm {
    pub fn new(product_id: Uuid) -> Self {
        Self {
            product_id,
            customer_name: String::new(),
            rating: 5,
            comment: String::new(),
        }
    }

    pub fn validate(&self) -> Result<NewReview, ValidationErrors> {
        validation::new_review(NewReview {
            product_id: self.product_id,
            customer_name: self.customer_name.clone(),
            rating: self.rating,
            comment: self.comment.clone(),
            images: vec![],
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordForm {
    pub fn validate(&self) -> Result<ChangePasswordRequest, ValidationErrors> {
        let mut mismatch = ValidationErrors::new();
        if self.new_password != self.confirm_password {
            mismatch.add("confirmPassword", "Passwords do not match");
        }
        let request = ChangePasswordRequest {
            current_password: self.current_password.clone(),
            new_password: self.new_password.clone(),
        };
        match validation::password_change(request) {
            Ok(request) => mismatch.finish(request),
            Err(rules) => Err(merge(mismatch, rules)),
        }
    }
}

/// Admin account creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl UserForm {
    pub fn validate(&self) -> Result<NewUser, ValidationErrors> {
        validation::new_user(NewUser {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            role: Role::Admin,
        })
    }
}

/// Blank text fields are left unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    pub image: Option<ImageUpload>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<ProfileChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = optional_text(&self.name);
        let email = optional_text(&self.email);
        if let Some(email) = &email {
            errors.check("email", validation::email(email));
        }
        if name.is_none() && email.is_none() && self.image.is_none() {
            errors.add("profile", "Nothing to update");
        }
        errors.finish(ProfileChanges {
            name,
            email,
            image: self.image.clone(),
        })
    }
}
