//! Plain-text rendering of catalog, cart and order records.

use crate::auth::{AdminStatus, Session};
use crate::schema::{Cart, Category, Order, Product};

pub fn product_line(product: &Product) -> String {
    let mut line = format!("#{:<5} {:<32} ${:>9}", product.id, product.name, product.price);
    if let Some(category) = &product.category {
        line.push_str(&format!("  [{}]", category.name));
    }
    if !product.is_available {
        line.push_str("  (unavailable)");
    }
    line
}

pub fn product_detail(product: &Product) -> String {
    let mut out = format!("{} (#{})\n", product.name, product.id);
    out.push_str(&format!("  Price: ${}\n", product.price));
    out.push_str(&format!("  Stock: {}\n", product.stock));
    if let Some(category) = &product.category {
        out.push_str(&format!("  Category: {}\n", category.name));
    }
    if let Some(image) = &product.image {
        out.push_str(&format!("  Image: {}\n", image));
    }
    if !product.description.is_empty() {
        out.push_str(&format!("\n  {}\n", product.description));
    }
    out
}

pub fn category_line(category: &Category) -> String {
    format!("#{:<5} {:<24} {}", category.id, category.name, category.slug)
}

pub fn cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Your cart is empty.".to_string();
    }
    let mut out = String::new();
    for item in &cart.items {
        out.push_str(&format!(
            "#{:<5} {:<32} {:>3} x ${:>8} = ${:>9}\n",
            item.product.id,
            item.product.name,
            item.quantity,
            item.product.price,
            item.subtotal()
        ));
    }
    out.push_str(&format!("Total: ${}", cart.total()));
    out
}

pub fn order(order: &Order) -> String {
    let when = order
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut out = format!(
        "Order #{}  {}  {}  ${}",
        order.id, when, order.status, order.total_amount
    );
    if let Some(user) = order.user {
        out.push_str(&format!("  (user {})", user));
    }
    for item in &order.items {
        out.push_str(&format!(
            "\n    {} x {}  ${}",
            item.product.name,
            item.quantity,
            item.subtotal()
        ));
    }
    out
}

pub fn session(session: &Session) -> String {
    let Some(user) = &session.user else {
        return "Not logged in.".to_string();
    };
    let admin = match session.admin_status() {
        AdminStatus::Unverified => "unknown",
        AdminStatus::Admin => "yes",
        AdminStatus::NotAdmin => "no",
    };
    format!("Logged in as {} (id {}), admin: {}", user.username, user.id, admin)
}
