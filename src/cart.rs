//! Cart view: the current cart plus the mutations that change it.
//!
//! Every refresh takes a sequencing ticket. A response whose ticket is no
//! longer current (a newer refresh started, or the view was closed) is
//! dropped instead of overwriting newer state.

use crate::http::{ApiClient, ApiError, Method};
use crate::schema::{
    AddItemRequest, AddItemResponse, Cart, MessageResponse, RemoveItemRequest, UpdateItemRequest,
};
use crate::seq::{RequestSeq, Ticket};

/// Result of a quantity change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Updated,
    /// Quantity below 1; nothing was sent
    Ignored,
}

pub struct CartView<'a> {
    api: &'a ApiClient,
    seq: RequestSeq,
    cart: Option<Cart>,
}

impl<'a> CartView<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self {
            api,
            seq: RequestSeq::new(),
            cart: None,
        }
    }

    pub fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    /// Fetch `carts/current/` and apply it if still current
    pub fn refresh(&mut self) -> Result<Option<&Cart>, ApiError> {
        let ticket = self.begin_fetch();
        let cart = fetch_current(self.api)?;
        self.apply(ticket, cart);
        Ok(self.cart.as_ref())
    }

    /// Apply a fetched cart. Returns false when the ticket is stale.
    pub fn apply(&mut self, ticket: Ticket, cart: Cart) -> bool {
        if !self.seq.is_current(ticket) {
            return false;
        }
        self.cart = Some(cart);
        true
    }

    pub fn begin_fetch(&self) -> Ticket {
        self.seq.issue()
    }

    /// Leave the view; late responses are ignored from now on
    pub fn close(&mut self) {
        self.seq.invalidate();
        self.cart = None;
    }

    pub fn add(&mut self, product_id: i64) -> Result<AddItemResponse, ApiError> {
        let response = add_item(self.api, product_id)?;
        self.refresh()?;
        Ok(response)
    }

    pub fn set_quantity(&mut self, product_id: i64, quantity: i64) -> Result<QuantityChange, ApiError> {
        let change = update_item(self.api, product_id, quantity)?;
        if change == QuantityChange::Updated {
            self.refresh()?;
        }
        Ok(change)
    }

    pub fn remove(&mut self, product_id: i64) -> Result<(), ApiError> {
        remove_item(self.api, product_id)?;
        self.refresh()?;
        Ok(())
    }
}

pub fn fetch_current(api: &ApiClient) -> Result<Cart, ApiError> {
    let cart: Cart = api.get("carts/current/")?;
    cart.validate()?;
    Ok(cart)
}

pub fn add_item(api: &ApiClient, product_id: i64) -> Result<AddItemResponse, ApiError> {
    api.post("carts/add_item/", &AddItemRequest { product_id })
}

/// Set a line's quantity. Anything below 1 is a no-op and sends nothing.
pub fn update_item(api: &ApiClient, product_id: i64, quantity: i64) -> Result<QuantityChange, ApiError> {
    if quantity < 1 {
        return Ok(QuantityChange::Ignored);
    }
    let quantity = u32::try_from(quantity)
        .map_err(|_| ApiError::invalid("quantity", format!("{} is too large", quantity)))?;
    let _: MessageResponse = api.post(
        "carts/update_item/",
        &UpdateItemRequest {
            product_id,
            quantity,
        },
    )?;
    Ok(QuantityChange::Updated)
}

pub fn remove_item(api: &ApiClient, product_id: i64) -> Result<(), ApiError> {
    let _: MessageResponse =
        api.send_json(Method::Delete, "carts/remove_item/", &RemoveItemRequest { product_id })?;
    Ok(())
}
