//! Client-side location tracking.
//!
//! Commands move the location as they run (`/cart`, `/admin/orders`, ...).
//! The 401 handler and the admin guard force it back to `/`; the shell reports
//! forced redirects once and then forgets them.

use std::cell::{Cell, RefCell};

pub const ROOT: &str = "/";

#[derive(Debug)]
pub struct Navigator {
    location: RefCell<String>,
    forced: Cell<bool>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            location: RefCell::new(ROOT.to_string()),
            forced: Cell::new(false),
        }
    }

    pub fn location(&self) -> String {
        self.location.borrow().clone()
    }

    pub fn go(&self, path: &str) {
        *self.location.borrow_mut() = path.to_string();
    }

    /// Force navigation to the root. Safe to call any number of times.
    pub fn redirect_root(&self) {
        self.go(ROOT);
        self.forced.set(true);
    }

    /// Returns true once after one or more forced redirects
    pub fn take_forced_redirect(&self) -> bool {
        self.forced.replace(false)
    }
}
