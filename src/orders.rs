//! Checkout and order history.

use crate::cart;
use crate::http::{ApiClient, ApiError};
use crate::navigation::Navigator;
use crate::schema::{CreateOrderRequest, Order};

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Turn the current cart into an order.
///
/// The cart is fetched first; a zero total is refused without calling
/// `orders/create_order/`. On success the location moves to `/orders`.
pub fn checkout(api: &ApiClient, navigator: &Navigator) -> Result<Order, CheckoutError> {
    navigator.go("/checkout");
    let current = cart::fetch_current(api)?;
    if current.is_empty() || current.total().is_zero() {
        return Err(CheckoutError::EmptyCart);
    }

    let order: Order = api.post("orders/create_order/", &CreateOrderRequest {})?;
    order.validate()?;
    navigator.go("/orders");
    Ok(order)
}

pub fn list_orders(api: &ApiClient) -> Result<Vec<Order>, ApiError> {
    validated(api.get("orders/listorders/")?)
}

pub(crate) fn validated(orders: Vec<Order>) -> Result<Vec<Order>, ApiError> {
    for order in &orders {
        order.validate()?;
    }
    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::MockTransport;
    use crate::http::Body;
    use crate::schema::Money;
    use serde_json::json;

    #[test]
    fn test_empty_cart_is_refused_before_ordering() {
        let transport = MockTransport::new();
        transport.respond(200, json!({"id": 1, "items": []}));
        let api = ApiClient::new("http://x/api", transport.clone());
        let nav = Navigator::new();

        let err = checkout(&api, &nav).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(nav.location(), "/checkout");
    }

    #[test]
    fn test_checkout_posts_empty_object_and_moves_to_orders() {
        let transport = MockTransport::new();
        transport.respond(
            200,
            json!({"id": 1, "items": [{"id": 5, "quantity": 2, "product":
                {"id": 10, "name": "Mug", "price": "9.99"}}]}),
        );
        transport.respond(
            200,
            json!({"id": 42, "total_amount": "19.98", "status": "confirmed", "items": []}),
        );
        let api = ApiClient::new("http://x/api", transport.clone());
        let nav = Navigator::new();

        let order = checkout(&api, &nav).unwrap();
        assert_eq!(order.id, 42);
        assert_eq!(order.total_amount, Money::from_cents(1998));
        assert_eq!(nav.location(), "/orders");

        let request = transport.last_request().unwrap();
        assert_eq!(request.path, "orders/create_order/");
        assert!(matches!(&request.body, Body::Json(v) if *v == json!({})));
    }

    #[test]
    fn test_backend_rejection_surfaces() {
        let transport = MockTransport::new();
        transport.respond(
            200,
            json!({"id": 1, "items": [{"id": 5, "quantity": 1, "product":
                {"id": 10, "name": "Mug", "price": "9.99"}}]}),
        );
        transport.respond(400, json!({"error": "Cart is empty"}));
        let api = ApiClient::new("http://x/api", transport);
        let err = checkout(&api, &Navigator::new()).unwrap_err();
        assert!(err.to_string().contains("Cart is empty"));
    }

    #[test]
    fn test_list_orders() {
        let transport = MockTransport::new();
        transport.respond(
            200,
            json!([{"id": 1, "total_amount": "5.00", "status": "confirmed"}]),
        );
        let api = ApiClient::new("http://x/api", transport.clone());
        let orders = list_orders(&api).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(transport.last_request().unwrap().path, "orders/listorders/");
    }

    #[test]
    fn test_overflowing_cart_is_rejected_before_ordering() {
        let transport = MockTransport::new();
        transport.respond(
            200,
            json!({"id": 1, "items": [{"id": 5, "quantity": 4294967295u32, "product":
                {"id": 10, "name": "Yacht", "price": "99999999.99"}}]}),
        );
        let api = ApiClient::new("http://x/api", transport.clone());
        let err = checkout(&api, &Navigator::new()).unwrap_err();
        assert!(matches!(err, CheckoutError::Api(ApiError::Invalid { .. })));
        assert_eq!(transport.request_count(), 1);
    }
}
