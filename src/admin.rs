//! Admin console: route guard plus product, category and order management.
//!
//! Catalog writes go through the admin-scoped client, where the backend
//! mounts its staff-only viewsets. Order management and the identity check
//! live under `admin/` on the general API root.

use crate::auth::{AuthController, Session};
use crate::http::{ApiClients, ApiError, FilePart, Method, Multipart};
use crate::navigation::Navigator;
use crate::schema::{Category, CategoryInput, DeleteOrderRequest, MessageResponse, Order, Product, ProductInput};
use std::path::Path;

/// Guard decision for an admin route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Hydration or the admin check has not finished
    Pending,
    Denied,
    Granted,
}

pub fn evaluate(session: &Session) -> Admission {
    if session.loading || !session.admin_checked {
        Admission::Pending
    } else if session.is_admin {
        Admission::Granted
    } else {
        Admission::Denied
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("admin access required")]
    Denied,
    #[error("session is still loading")]
    Pending,
}

/// Admit the caller to an admin route, running the admin check first if it
/// has not completed for the current token. Denial sends the navigator home.
pub fn admit(auth: &AuthController, navigator: &Navigator, route: &str) -> Result<(), GuardError> {
    let session = auth.session();
    if !session.loading {
        auth.ensure_admin_checked();
    }
    match evaluate(&auth.session()) {
        Admission::Granted => {
            navigator.go(route);
            Ok(())
        }
        Admission::Denied => {
            navigator.redirect_root();
            Err(GuardError::Denied)
        }
        Admission::Pending => Err(GuardError::Pending),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Build the multipart form for a product create/update
pub fn product_form(input: &ProductInput) -> Result<Multipart, ApiError> {
    input.validate()?;
    let mut form = Multipart::new()
        .text("name", input.name.as_str())
        .text("description", input.description.as_str())
        .text("price", input.price.to_string())
        .text("stock", input.stock.to_string())
        .text("category_id", input.category_id.to_string())
        .text("is_available", input.is_available.to_string());

    if let Some(path) = &input.image {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        form = form.file(FilePart {
            name: "image".to_string(),
            filename,
            content_type: content_type_for(path).to_string(),
            bytes,
        });
    }
    Ok(form)
}

pub fn list_products(clients: &ApiClients) -> Result<Vec<Product>, ApiError> {
    clients.admin.get("products/")
}

pub fn create_product(clients: &ApiClients, input: &ProductInput) -> Result<Product, ApiError> {
    let form = product_form(input)?;
    clients.admin.send_multipart(Method::Post, "products/", form)
}

pub fn update_product(clients: &ApiClients, id: i64, input: &ProductInput) -> Result<Product, ApiError> {
    let form = product_form(input)?;
    clients
        .admin
        .send_multipart(Method::Put, &format!("products/{}/", id), form)
}

pub fn delete_product(clients: &ApiClients, id: i64) -> Result<(), ApiError> {
    clients.admin.delete(&format!("products/{}/", id))
}

pub fn list_categories(clients: &ApiClients) -> Result<Vec<Category>, ApiError> {
    clients.admin.get("categories/")
}

pub fn create_category(clients: &ApiClients, input: &CategoryInput) -> Result<Category, ApiError> {
    input.validate()?;
    clients.admin.post("categories/", input)
}

pub fn update_category(clients: &ApiClients, id: i64, input: &CategoryInput) -> Result<Category, ApiError> {
    input.validate()?;
    clients.admin.put(&format!("categories/{}/", id), input)
}

pub fn delete_category(clients: &ApiClients, id: i64) -> Result<(), ApiError> {
    clients.admin.delete(&format!("categories/{}/", id))
}

pub fn list_all_orders(clients: &ApiClients) -> Result<Vec<Order>, ApiError> {
    crate::orders::validated(clients.api.get("admin/orders/")?)
}

pub fn delete_order(clients: &ApiClients, order_id: i64) -> Result<(), ApiError> {
    let _: MessageResponse = clients
        .api
        .post("admin/delete_order/", &DeleteOrderRequest { order_id })?;
    Ok(())
}
