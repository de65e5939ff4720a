//! Value objects for the storefront domain

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Products at or below this level are flagged in the inventory views.
pub const LOW_STOCK_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("price must not be negative")]
    NegativePrice,
    #[error("stock must not be negative (got {0})")]
    NegativeStock(i64),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
    #[error("{0} is required")]
    Required(&'static str),
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Time-ordered id, so sorting by id is sorting by insertion.
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub const fn from_uuid(id: Uuid) -> Self { Self(id) }
            pub const fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl Default for $name {
            fn default() -> Self { Self::new() }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s).map(Self) }
        }
    };
}

entity_id!(ProductId);
entity_id!(OrderId);
entity_id!(OrderItemId);
entity_id!(UserId);

/// Non-negative unit price, kept at cent precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub fn new(amount: Decimal) -> Result<Self, ValueError> {
        if amount < Decimal::ZERO {
            return Err(ValueError::NegativePrice);
        }
        Ok(Self(amount.round_dp(2)))
    }
    pub const fn amount(&self) -> Decimal { self.0 }
    pub fn times(&self, quantity: u32) -> Decimal { self.0 * Decimal::from(quantity) }
}

impl TryFrom<Decimal> for Price {
    type Error = ValueError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self { price.0 }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Units on hand for a product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stock(u32);

impl Stock {
    pub const fn new(value: u32) -> Self { Self(value) }
    pub const fn value(&self) -> u32 { self.0 }
    pub const fn is_low(&self) -> bool { self.0 <= LOW_STOCK_THRESHOLD }
    pub fn subtract(&self, other: u32) -> Option<Self> { self.0.checked_sub(other).map(Self) }
}

impl TryFrom<i32> for Stock {
    type Error = ValueError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u32::try_from(value).map(Self).map_err(|_| ValueError::NegativeStock(i64::from(value)))
    }
}

impl TryFrom<i64> for Stock {
    type Error = ValueError;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value).map(Self).map_err(|_| ValueError::NegativeStock(value))
    }
}

/// Lower-cased, trimmed email address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(value: &str) -> Result<Self, ValueError> {
        let value = value.trim().to_lowercase();
        // Same rule as `#[validate(email)]` on request payloads.
        if !validator::validate_email(value.as_str()) {
            return Err(ValueError::InvalidEmail(value));
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Email {
    type Error = ValueError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<Email> for String {
    fn from(email: Email) -> Self { email.0 }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Phones,
    Computers,
    Accessories,
    Printers,
    Cameras,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Phones, Self::Computers, Self::Accessories, Self::Printers, Self::Cameras, Self::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Phones => "Phones",
            Self::Computers => "Computers",
            Self::Accessories => "Accessories",
            Self::Printers => "Printers",
            Self::Cameras => "Cameras",
            Self::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = ValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValueError::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Access tier of a user account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Client,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self { Self::Admin => "admin", Self::Client => "client" }
    }
}

impl FromStr for Role {
    type Err = ValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Self::Admin),
            "client" => Ok(Self::Client),
            other => Err(ValueError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Trims `value` and fails with `Required(field)` when nothing is left.
pub fn required(field: &'static str, value: &str) -> Result<String, ValueError> {
    let value = value.trim();
    if value.is_empty() { Err(ValueError::Required(field)) } else { Ok(value.to_string()) }
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn test_price_rejects_negative() {
        assert_eq!(Price::new(Decimal::new(-1, 2)), Err(ValueError::NegativePrice));
        assert_eq!(Price::new(Decimal::new(19999, 3)).unwrap().amount(), Decimal::new(2000, 2));
        assert_eq!(Price::new(Decimal::ZERO).unwrap().times(3), Decimal::ZERO);
    }

    #[test]
    fn test_price_deserialize_validates() {
        assert!(serde_json::from_str::<Price>("\"-3.00\"").is_err());
        let p: Price = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(p.times(2), Decimal::new(2500, 2));
    }

    #[test]
    fn test_stock() {
        let s = Stock::new(5);
        assert_eq!(s.subtract(2), Some(Stock::new(3)));
        assert_eq!(s.subtract(6), None);
        assert!(Stock::try_from(-1_i32).is_err());
        assert!(Stock::new(10).is_low());
        assert!(!Stock::new(11).is_low());
    }

    #[test]
    fn test_email() {
        assert_eq!(Email::parse("  Ana@Example.COM ").unwrap().as_str(), "ana@example.com");
        assert!(Email::parse("no-at-sign").is_err());
        assert!(Email::parse("a@@b.com").is_err());
        assert!(Email::parse("a b@example.com").is_err());
        for sample in ["ana@example.com", "ana@localhost", "ana@-bad.com", "@example.com", "ana@exa mple.com"] {
            let form = crate::contact::ContactMessage { name: "Ana".into(), email: sample.into(), message: "hi".into() };
            assert_eq!(Email::parse(sample).is_ok(), form.validate().is_ok(), "{sample}");
        }
    }

    #[test]
    fn test_category_and_role_parse() {
        assert_eq!("cameras".parse::<Category>().unwrap(), Category::Cameras);
        assert!("Toasters".parse::<Category>().is_err());
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Client).unwrap(), "\"client\"");
    }
}
