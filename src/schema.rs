//! Request and response records for every backend endpoint.
//!
//! Responses are decoded strictly through serde and then checked with
//! `validate()`; a payload that does not fit is rejected, never patched up.

use crate::http::ApiError;
use crate::session::User;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

/// A fixed-point amount in cents.
///
/// The backend sends decimals as strings (`"12.50"`); numbers are accepted
/// too. More than two fractional digits is a malformed amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money(i64);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Saturates instead of overflowing; `validate()` rejects records where
    /// that would matter.
    pub fn times(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn parse(s: &str) -> Option<Money> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let whole: i64 = whole.parse().ok()?;
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        let cents = whole.checked_mul(100)?.checked_add(frac_cents)?;
        Some(Money(if negative { -cents } else { cents }))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.fold(0i64, |acc, m| acc.saturating_add(m.0)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }
        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => format!("{:.2}", n),
        };
        Money::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount '{}'", text)))
    }
}

// ---------------------------------------------------------------------------
// Auth

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Answer of both `auth/login/` and `auth/register/`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
}

impl AuthResponse {
    pub fn validate(self) -> Result<Self, ApiError> {
        if self.token.trim().is_empty() {
            return Err(ApiError::invalid("token", "empty token in auth response"));
        }
        if self.username.trim().is_empty() {
            return Err(ApiError::invalid("username", "empty username in auth response"));
        }
        Ok(self)
    }

    /// The locally cached user. `is_staff` is never taken from the server.
    pub fn to_user(&self) -> User {
        User {
            id: self.user_id,
            username: self.username.clone(),
            email: None,
            is_staff: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
}

impl CategoryInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::invalid("name", "must not be empty"));
        }
        if !SLUG_RE.is_match(&self.slug) {
            return Err(ApiError::invalid(
                "slug",
                format!(
                    "'{}' may only contain letters, digits, '-' and '_'",
                    self.slug
                ),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.price.cents() < 0 {
            return Err(ApiError::invalid(
                "price",
                format!("negative price for product {}", self.id),
            ));
        }
        Ok(())
    }
}

/// Fields of an admin product create/update, sent as multipart form data
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub category_id: i64,
    pub is_available: bool,
    pub image: Option<PathBuf>,
}

impl ProductInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::invalid("name", "must not be empty"));
        }
        if self.price.cents() < 0 {
            return Err(ApiError::invalid("price", "must not be negative"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cart

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn subtotal(&self) -> Money {
        self.product.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Cart {
    pub id: i64,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        for item in &self.items {
            item.product.validate()?;
        }
        let lines = self
            .items
            .iter()
            .map(|item| item.product.price.checked_times(item.quantity));
        checked_total(lines).ok_or_else(|| {
            ApiError::invalid("items", format!("total of cart {} is out of range", self.id))
        })?;
        Ok(())
    }
}

/// Sum of line amounts, `None` if any line or the running total overflows
fn checked_total(lines: impl Iterator<Item = Option<Money>>) -> Option<Money> {
    lines.fold(Some(Money::default()), |acc, line| acc?.checked_add(line?))
}

#[derive(Debug, Serialize)]
pub struct AddItemRequest {
    pub product_id: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdateItemRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct RemoveItemRequest {
    pub product_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItemResponse {
    #[serde(default)]
    pub message: String,
    pub cart_item_id: i64,
    pub total_items: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Orders

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub product: Product,
    pub quantity: u32,
    pub price: Money,
}

impl OrderItem {
    pub fn subtotal(&self) -> Money {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<i64>,
}

impl Order {
    pub fn validate(&self) -> Result<(), ApiError> {
        let lines = self
            .items
            .iter()
            .map(|item| item.price.checked_times(item.quantity));
        checked_total(lines).ok_or_else(|| {
            ApiError::invalid("items", format!("total of order {} is out of range", self.id))
        })?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {}

#[derive(Debug, Serialize)]
pub struct DeleteOrderRequest {
    pub order_id: i64,
}
