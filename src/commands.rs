//! Command grammar shared by one-shot runs and the interactive shell.
//!
//! `shop cart` on the command line and `cart` at the `shop>` prompt parse
//! through the same `Command` enum.

use crate::schema::Money;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a few featured products
    Home,
    /// List products
    Products {
        #[arg(short, long, help = "Maximum number of products")]
        limit: Option<u32>,
        #[arg(short, long, help = "Only show products whose name contains this")]
        filter: Option<String>,
    },
    /// Show one product
    Product { id: i64 },
    /// Search products by name on the server
    Search { query: String },
    /// List categories
    Categories,
    /// Log in
    Login {
        username: String,
        #[arg(long, help = "Password (prompted for when omitted)")]
        password: Option<String>,
    },
    /// Create an account and log in
    Register {
        username: String,
        email: String,
        #[arg(long, help = "Password (prompted for when omitted)")]
        password: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the current session
    Whoami,
    /// Show the cart
    Cart,
    /// Add a product to the cart
    Add { product_id: i64 },
    /// Set the quantity of a cart line (below 1 is ignored)
    Qty {
        product_id: i64,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a product from the cart
    Remove { product_id: i64 },
    /// Place an order for everything in the cart
    Checkout,
    /// Show your order history
    Orders,
    /// Admin console
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List all products, including unavailable ones
    Products,
    /// Create a product
    ProductCreate(ProductFields),
    /// Replace a product
    ProductUpdate {
        id: i64,
        #[command(flatten)]
        fields: ProductFields,
    },
    /// Delete a product
    ProductDelete { id: i64 },
    /// List categories
    Categories,
    /// Create a category
    CategoryCreate { name: String, slug: String },
    /// Rename a category
    CategoryUpdate { id: i64, name: String, slug: String },
    /// Delete a category
    CategoryDelete { id: i64 },
    /// List every customer's orders
    Orders,
    /// Delete an order
    OrderDelete { id: i64 },
}

#[derive(Debug, ClapArgs)]
pub struct ProductFields {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, value_parser = parse_money)]
    pub price: Money,
    #[arg(long, default_value_t = 0)]
    pub stock: u32,
    #[arg(long)]
    pub category: i64,
    #[arg(long, help = "Image file to upload")]
    pub image: Option<PathBuf>,
    #[arg(long, help = "Hide the product from the storefront")]
    pub unavailable: bool,
}

fn parse_money(s: &str) -> Result<Money, String> {
    Money::parse(s).ok_or_else(|| format!("'{}' is not an amount like 12.50", s))
}

/// One line typed at the shell prompt
#[derive(Debug, Parser)]
#[command(name = "shop", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

/// What a shell line asks for
#[derive(Debug)]
pub enum LineAction {
    Run(Command),
    Exit,
    Empty,
    /// Help text or a usage error to print
    Message(String),
}

pub fn parse_line(line: &str) -> LineAction {
    let line = line.trim();
    if line.is_empty() {
        return LineAction::Empty;
    }
    if matches!(line, "exit" | "quit" | "/exit" | "/quit") {
        return LineAction::Exit;
    }

    let words = match shell_words::split(line) {
        Ok(words) => words,
        Err(e) => return LineAction::Message(format!("Could not parse line: {}", e)),
    };
    match ShellLine::try_parse_from(words) {
        Ok(parsed) => LineAction::Run(parsed.command),
        Err(e) => LineAction::Message(e.render().to_string()),
    }
}
