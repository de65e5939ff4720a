//! TechStore
//!
//! Electronics storefront and admin console.
//!
//! ## Features
//! - Product catalog with brand, category and name filters
//! - Session cart and transactional checkout
//! - Customer order history
//! - Admin product, inventory, order and user management
//! - Typed client SDK with pluggable key-value storage and route guards

pub mod accounts;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod client;
pub mod config;
pub mod contact;
pub mod domain;
pub mod http;
pub mod images;
pub mod listing;
pub mod orders;
pub mod publisher;
pub mod repository;
pub mod session;
pub mod storage;

pub use client::StorefrontClient;
pub use config::AppConfig;
pub use http::{router, AppState};
