//! Public catalog: products and categories.

use crate::http::{ApiClient, ApiError};
use crate::schema::{Category, Product};

/// How many products the home screen shows
pub const FEATURED_LIMIT: u32 = 3;

fn validated(products: Vec<Product>) -> Result<Vec<Product>, ApiError> {
    for product in &products {
        product.validate()?;
    }
    Ok(products)
}

pub fn list_products(api: &ApiClient, limit: Option<u32>) -> Result<Vec<Product>, ApiError> {
    let products: Vec<Product> = match limit {
        Some(n) => api.get_with_query("products/", &[("limit", n.to_string())])?,
        None => api.get("products/")?,
    };
    validated(products)
}

/// First few products for the home screen. The backend may ignore `limit`,
/// so the list is also cut locally.
pub fn featured(api: &ApiClient) -> Result<Vec<Product>, ApiError> {
    let mut products = list_products(api, Some(FEATURED_LIMIT))?;
    products.truncate(FEATURED_LIMIT as usize);
    Ok(products)
}

pub fn product(api: &ApiClient, id: i64) -> Result<Product, ApiError> {
    let product: Product = api.get(&format!("products/{}/", id))?;
    product.validate()?;
    Ok(product)
}

/// Server-side name search
pub fn search(api: &ApiClient, query: &str) -> Result<Vec<Product>, ApiError> {
    let products: Vec<Product> = api.get_with_query("products/search/", &[("q", query.to_string())])?;
    validated(products)
}

/// Case-insensitive substring filter over an already fetched list
pub fn filter_by_name<'a>(products: &'a [Product], needle: &str) -> Vec<&'a Product> {
    let needle = needle.to_lowercase();
    products
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .collect()
}

pub fn list_categories(api: &ApiClient) -> Result<Vec<Category>, ApiError> {
    api.get("categories/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::MockTransport;
    use crate::schema::Money;
    use serde_json::json;

    fn products_json() -> serde_json::Value {
        json!([
            {"id": 1, "name": "Blue Mug", "price": "9.99"},
            {"id": 2, "name": "Green Tea", "price": "4.50"},
            {"id": 3, "name": "mug warmer", "price": "19.00"},
            {"id": 4, "name": "Spoon", "price": "1.00"}
        ])
    }

    #[test]
    fn test_featured_sends_limit_and_truncates() {
        let transport = MockTransport::new();
        transport.respond(200, products_json());
        let api = ApiClient::new("http://x/api", transport.clone());

        let products = featured(&api).unwrap();
        assert_eq!(products.len(), 3);
        let request = transport.last_request().unwrap();
        assert_eq!(request.path, "products/");
        assert_eq!(request.query, vec![("limit".to_string(), "3".to_string())]);
    }

    #[test]
    fn test_list_without_limit_has_no_query() {
        let transport = MockTransport::new();
        transport.respond(200, products_json());
        let api = ApiClient::new("http://x/api", transport.clone());
        let products = list_products(&api, None).unwrap();
        assert_eq!(products.len(), 4);
        assert_eq!(products[0].price, Money::from_cents(999));
        assert!(transport.last_request().unwrap().query.is_empty());
    }

    #[test]
    fn test_filter_by_name_is_case_insensitive() {
        let products: Vec<Product> = serde_json::from_value(products_json()).unwrap();
        let names: Vec<&str> = filter_by_name(&products, "MUG")
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Blue Mug", "mug warmer"]);
        assert_eq!(filter_by_name(&products, "").len(), 4);
    }

    #[test]
    fn test_search_uses_search_endpoint() {
        let transport = MockTransport::new();
        transport.respond(200, json!([{"id": 2, "name": "Green Tea", "price": "4.50"}]));
        let api = ApiClient::new("http://x/api", transport.clone());
        let found = search(&api, "tea").unwrap();
        assert_eq!(found.len(), 1);
        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "http://x/api/products/search/");
        assert_eq!(request.query, vec![("q".to_string(), "tea".to_string())]);
    }

    #[test]
    fn test_product_detail_not_found() {
        let transport = MockTransport::new();
        transport.respond(404, json!({"detail": "Not found."}));
        let api = ApiClient::new("http://x/api", transport);
        let err = product(&api, 99).unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_malformed_product_list_rejected() {
        let transport = MockTransport::new();
        transport.respond(200, json!([{"id": 1, "name": "Mug"}]));
        let api = ApiClient::new("http://x/api", transport);
        assert!(matches!(
            list_products(&api, None),
            Err(ApiError::Decode { .. })
        ));
    }
}
