//! Domain rules shared by the API server and the catalog client.

pub mod envelope;
pub mod images;
pub mod models;
pub mod pagination;
pub mod pricing;
pub mod validation;
