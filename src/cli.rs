use crate::{
    admin::{self, GuardError},
    auth::{AuthController, SessionWriter},
    cart::{CartView, QuantityChange},
    catalog,
    commands::{parse_line, AdminCommand, Command, LineAction, ProductFields},
    http::{ApiClients, Interceptor, Transport},
    middleware::{AuthHeader, RequestLog, UnauthorizedReset},
    navigation::Navigator,
    orders::{self, CheckoutError},
    render,
    schema::{CategoryInput, ProductInput},
    session::SessionStore,
    transcript::SharedTranscript,
};
use anyhow::{bail, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::rc::Rc;

pub struct Context {
    pub run_id: String,
    pub yes: bool,
    pub auth: AuthController,
    pub clients: Rc<ApiClients>,
    pub navigator: Rc<Navigator>,
    pub transcript: SharedTranscript,
    pub request_log: Rc<RequestLog>,
}

/// Endpoints and flags needed to assemble a `Context`
pub struct Wiring<'a> {
    pub base_url: &'a str,
    pub admin_base_url: &'a str,
    pub run_id: &'a str,
    pub verbose: bool,
    pub yes: bool,
}

impl Context {
    /// Wire store, session, interceptors and clients together. The session
    /// is not hydrated yet.
    pub fn build(
        wiring: Wiring<'_>,
        transport: Rc<dyn Transport>,
        store: Rc<dyn SessionStore>,
        transcript: SharedTranscript,
    ) -> Self {
        let navigator = Rc::new(Navigator::new());
        let (writer, _reader) = SessionWriter::create();
        let request_log = Rc::new(RequestLog::new(transcript.clone(), wiring.verbose));

        let interceptors: Vec<Rc<dyn Interceptor>> = vec![
            Rc::new(AuthHeader::new(store.clone())),
            Rc::new(UnauthorizedReset::new(
                store.clone(),
                writer.clone(),
                navigator.clone(),
                transcript.clone(),
            )),
            request_log.clone() as Rc<dyn Interceptor>,
        ];
        let clients = Rc::new(ApiClients::new(
            wiring.base_url,
            wiring.admin_base_url,
            transport,
            &interceptors,
        ));
        let auth = AuthController::new(writer, store, clients.clone(), transcript.clone());

        Self {
            run_id: wiring.run_id.to_string(),
            yes: wiring.yes,
            auth,
            clients,
            navigator,
            transcript,
            request_log,
        }
    }
}

pub fn run_once(ctx: &Context, command: Command) -> Result<()> {
    let result = run_command(ctx, command);
    report_redirect(ctx);
    result
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("shop - type help for commands, exit to quit");
    if let Some(user) = ctx.auth.reader().user() {
        println!("Logged in as {}", user.username);
    }

    loop {
        match rl.readline("shop> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if line.starts_with('/') && handle_shell_command(&ctx, line) {
                    continue;
                }

                match parse_line(line) {
                    LineAction::Run(command) => {
                        if let Err(e) = run_command(&ctx, command) {
                            eprintln!("Error: {}", e);
                        }
                        report_redirect(&ctx);
                    }
                    LineAction::Message(text) => println!("{}", text.trim_end()),
                    LineAction::Empty => {}
                    LineAction::Exit => break,
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Shell-only slash commands. Returns false for lines the command grammar
/// should handle instead.
fn handle_shell_command(ctx: &Context, line: &str) -> bool {
    match line {
        "/session" => {
            println!("Run: {}", ctx.run_id);
            println!("Transcript: {:?}", ctx.transcript.borrow().path);
            println!("Location: {}", ctx.navigator.location());
            println!("Phase: {:?}", ctx.auth.reader().phase());
            println!("{}", render::session(&ctx.auth.session()));
        }
        "/verbose" => {
            let verbose = !ctx.request_log.verbose();
            ctx.request_log.set_verbose(verbose);
            println!("Verbose: {}", if verbose { "on" } else { "off" });
        }
        "/help" => println!("Shell: /session, /verbose, /exit. Type help for commands."),
        _ => return false,
    }
    true
}

fn report_redirect(ctx: &Context) {
    if ctx.navigator.take_forced_redirect() {
        if ctx.auth.reader().is_authenticated() {
            println!("(redirected to /)");
        } else {
            println!("(signed out, redirected to /)");
        }
    }
}

pub fn run_command(ctx: &Context, command: Command) -> Result<()> {
    let api = &ctx.clients.api;
    match command {
        Command::Home => {
            ctx.navigator.go("/");
            println!("Featured products:");
            for product in catalog::featured(api)? {
                println!("  {}", render::product_line(&product));
            }
        }
        Command::Products { limit, filter } => {
            ctx.navigator.go("/products");
            let products = catalog::list_products(api, limit)?;
            let shown = match &filter {
                Some(needle) => catalog::filter_by_name(&products, needle),
                None => products.iter().collect(),
            };
            if shown.is_empty() {
                println!("No products found.");
            }
            for product in shown {
                println!("{}", render::product_line(product));
            }
        }
        Command::Product { id } => {
            ctx.navigator.go(&format!("/products/{}", id));
            let product = catalog::product(api, id)?;
            print!("{}", render::product_detail(&product));
        }
        Command::Search { query } => {
            ctx.navigator.go("/products");
            let results = catalog::search(api, &query)?;
            if results.is_empty() {
                println!("No products match '{}'.", query);
            }
            for product in &results {
                println!("{}", render::product_line(product));
            }
        }
        Command::Categories => {
            ctx.navigator.go("/products");
            for category in catalog::list_categories(api)? {
                println!("{}", render::category_line(&category));
            }
        }
        Command::Login { username, password } => {
            ctx.navigator.go("/login");
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let user = ctx.auth.login(&username, &password)?;
            ctx.navigator.go("/");
            let admin = if ctx.auth.session().is_admin { " (admin)" } else { "" };
            println!("Welcome back, {}{}", user.username, admin);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            ctx.navigator.go("/register");
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let user = ctx.auth.register(&username, &email, &password)?;
            ctx.navigator.go("/");
            println!("Account created. Logged in as {}", user.username);
        }
        Command::Logout => {
            ctx.auth.logout();
            ctx.navigator.go("/");
            println!("Logged out.");
        }
        Command::Whoami => println!("{}", render::session(&ctx.auth.session())),
        Command::Cart => {
            require_login(ctx)?;
            ctx.navigator.go("/cart");
            let mut view = CartView::new(api);
            if let Some(cart) = view.refresh()? {
                println!("{}", render::cart(cart));
            }
            view.close();
        }
        Command::Add { product_id } => {
            require_login(ctx)?;
            let mut view = CartView::new(api);
            let added = view.add(product_id)?;
            println!(
                "{} (line #{}, {} items in cart)",
                added.message, added.cart_item_id, added.total_items
            );
            view.close();
        }
        Command::Qty {
            product_id,
            quantity,
        } => {
            require_login(ctx)?;
            ctx.navigator.go("/cart");
            let mut view = CartView::new(api);
            match view.set_quantity(product_id, quantity)? {
                QuantityChange::Ignored => println!("Quantity must be at least 1; nothing changed."),
                QuantityChange::Updated => {
                    if let Some(cart) = view.cart() {
                        println!("{}", render::cart(cart));
                    }
                }
            }
            view.close();
        }
        Command::Remove { product_id } => {
            require_login(ctx)?;
            ctx.navigator.go("/cart");
            let mut view = CartView::new(api);
            view.remove(product_id)?;
            if let Some(cart) = view.cart() {
                println!("{}", render::cart(cart));
            }
            view.close();
        }
        Command::Checkout => {
            require_login(ctx)?;
            match orders::checkout(api, &ctx.navigator) {
                Ok(order) => println!(
                    "Order #{} placed. Total ${}",
                    order.id, order.total_amount
                ),
                Err(CheckoutError::EmptyCart) => bail!("Your cart is empty; nothing to check out."),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Orders => {
            require_login(ctx)?;
            ctx.navigator.go("/orders");
            print_orders(&orders::list_orders(api)?);
        }
        Command::Admin(command) => run_admin(ctx, command)?,
    }
    Ok(())
}

fn run_admin(ctx: &Context, command: AdminCommand) -> Result<()> {
    let clients = &ctx.clients;
    match command {
        AdminCommand::Products => {
            admit(ctx, "/admin/products")?;
            for product in admin::list_products(clients)? {
                println!("{}", render::product_line(&product));
            }
        }
        AdminCommand::ProductCreate(fields) => {
            admit(ctx, "/admin/products")?;
            let product = admin::create_product(clients, &product_input(fields))?;
            println!("Created product #{} {}", product.id, product.name);
        }
        AdminCommand::ProductUpdate { id, fields } => {
            admit(ctx, "/admin/products")?;
            let product = admin::update_product(clients, id, &product_input(fields))?;
            println!("Updated product #{} {}", product.id, product.name);
        }
        AdminCommand::ProductDelete { id } => {
            admit(ctx, "/admin/products")?;
            if confirm(ctx, &format!("Delete product #{}", id)) {
                admin::delete_product(clients, id)?;
                println!("Deleted product #{}", id);
            }
        }
        AdminCommand::Categories => {
            admit(ctx, "/admin/categories")?;
            for category in admin::list_categories(clients)? {
                println!("{}", render::category_line(&category));
            }
        }
        AdminCommand::CategoryCreate { name, slug } => {
            admit(ctx, "/admin/categories")?;
            let category = admin::create_category(clients, &CategoryInput { name, slug })?;
            println!("Created category #{} {}", category.id, category.name);
        }
        AdminCommand::CategoryUpdate { id, name, slug } => {
            admit(ctx, "/admin/categories")?;
            let category = admin::update_category(clients, id, &CategoryInput { name, slug })?;
            println!("Updated category #{} {}", category.id, category.name);
        }
        AdminCommand::CategoryDelete { id } => {
            admit(ctx, "/admin/categories")?;
            if confirm(ctx, &format!("Delete category #{}", id)) {
                admin::delete_category(clients, id)?;
                println!("Deleted category #{}", id);
            }
        }
        AdminCommand::Orders => {
            admit(ctx, "/admin/orders")?;
            print_orders(&admin::list_all_orders(clients)?);
        }
        AdminCommand::OrderDelete { id } => {
            admit(ctx, "/admin/orders")?;
            if confirm(ctx, &format!("Delete order #{}", id)) {
                admin::delete_order(clients, id)?;
                println!("Deleted order #{}", id);
            }
        }
    }
    Ok(())
}

fn admit(ctx: &Context, route: &str) -> Result<()> {
    match admin::admit(&ctx.auth, &ctx.navigator, route) {
        Ok(()) => Ok(()),
        Err(GuardError::Denied) => bail!("Admin access required."),
        Err(GuardError::Pending) => bail!("Session is still loading; try again."),
    }
}

fn require_login(ctx: &Context) -> Result<()> {
    if !ctx.auth.reader().is_authenticated() {
        ctx.navigator.go("/login");
        bail!("Please log in first (login <username>).");
    }
    Ok(())
}

fn product_input(fields: ProductFields) -> ProductInput {
    ProductInput {
        name: fields.name,
        description: fields.description,
        price: fields.price,
        stock: fields.stock,
        category_id: fields.category,
        is_available: !fields.unavailable,
        image: fields.image,
    }
}

fn print_orders(orders: &[crate::schema::Order]) {
    if orders.is_empty() {
        println!("No orders yet.");
    }
    for order in orders {
        println!("{}", render::order(order));
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(ctx: &Context, action: &str) -> bool {
    if ctx.yes {
        return true;
    }
    match prompt(&format!("{}? [y/N]: ", action)) {
        Ok(answer) => {
            let answer = answer.trim().to_lowercase();
            answer == "y" || answer == "yes"
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::MockTransport;
    use crate::session::{MemorySessionStore, User};
    use crate::transcript::Transcript;
    use serde_json::json;

    fn context(mock: &Rc<MockTransport>, store: Rc<MemorySessionStore>) -> Context {
        let ctx = Context::build(
            Wiring {
                base_url: "http://shop.test/api",
                admin_base_url: "http://shop.test/api/admin",
                run_id: "run-1",
                verbose: false,
                yes: true,
            },
            mock.clone(),
            store,
            Transcript::disabled("run-1").shared(),
        );
        ctx.auth.hydrate();
        ctx
    }

    fn logged_in_store() -> Rc<MemorySessionStore> {
        let store = Rc::new(MemorySessionStore::new());
        let user = User {
            id: 7,
            username: "alice".to_string(),
            email: None,
            is_staff: false,
        };
        store.save("T1", &user).unwrap();
        store
    }

    #[test]
    fn test_cart_requires_login_without_request() {
        let mock = MockTransport::new();
        let ctx = context(&mock, Rc::new(MemorySessionStore::new()));

        let err = run_command(&ctx, Command::Cart).unwrap_err();
        assert!(err.to_string().contains("log in"));
        assert_eq!(mock.request_count(), 0);
        assert_eq!(ctx.navigator.location(), "/login");
    }

    #[test]
    fn test_cart_sends_saved_token() {
        let mock = MockTransport::new();
        let ctx = context(&mock, logged_in_store());
        mock.respond(200, json!({"id": 1, "items": []}));

        run_command(&ctx, Command::Cart).unwrap();
        let req = mock.last_request().unwrap();
        assert_eq!(req.url, "http://shop.test/api/carts/current/");
        assert_eq!(req.header("Authorization"), Some("Token T1"));
        assert_eq!(ctx.navigator.location(), "/cart");
    }

    #[test]
    fn test_expired_token_signs_out_and_reports_redirect() {
        let mock = MockTransport::new();
        let store = logged_in_store();
        let ctx = context(&mock, store.clone());
        mock.respond(401, json!({"detail": "Invalid token."}));

        assert!(run_command(&ctx, Command::Orders).is_err());
        assert!(!ctx.auth.reader().is_authenticated());
        assert!(store.token().is_none());
        assert!(ctx.navigator.take_forced_redirect());
        assert_eq!(ctx.navigator.location(), "/");
    }

    #[test]
    fn test_admin_command_denied_for_regular_user() {
        let mock = MockTransport::new();
        let ctx = context(&mock, logged_in_store());
        mock.respond(403, json!({"detail": "forbidden"}));

        let err = run_command(&ctx, Command::Admin(AdminCommand::Orders)).unwrap_err();
        assert!(err.to_string().contains("Admin access required"));
        // only the admin check went out
        assert_eq!(mock.request_count(), 1);
        assert_eq!(ctx.navigator.location(), "/");
    }

    #[test]
    fn test_admin_orders_for_admin() {
        let mock = MockTransport::new();
        let ctx = context(&mock, logged_in_store());
        mock.respond(200, json!({"id": 7}));
        mock.respond(200, json!([]));

        run_command(&ctx, Command::Admin(AdminCommand::Orders)).unwrap();
        let requests = mock.requests();
        assert_eq!(requests[0].path, "admin/me/");
        assert_eq!(requests[1].path, "admin/orders/");
        assert_eq!(ctx.navigator.location(), "/admin/orders");
    }

    #[test]
    fn test_qty_below_one_makes_no_request() {
        let mock = MockTransport::new();
        let ctx = context(&mock, logged_in_store());

        run_command(
            &ctx,
            Command::Qty {
                product_id: 10,
                quantity: 0,
            },
        )
        .unwrap();
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_checkout_empty_cart() {
        let mock = MockTransport::new();
        let ctx = context(&mock, logged_in_store());
        mock.respond(200, json!({"id": 1, "items": []}));

        let err = run_command(&ctx, Command::Checkout).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_login_then_logout() {
        let mock = MockTransport::new();
        let store = Rc::new(MemorySessionStore::new());
        let ctx = context(&mock, store.clone());
        mock.respond(200, json!({"token": "T9", "user_id": 3, "username": "bob"}));
        mock.respond(403, json!({"detail": "forbidden"}));

        run_command(
            &ctx,
            Command::Login {
                username: "bob".to_string(),
                password: Some("pw".to_string()),
            },
        )
        .unwrap();
        assert_eq!(store.token().as_deref(), Some("T9"));
        assert_eq!(ctx.navigator.location(), "/");

        run_command(&ctx, Command::Logout).unwrap();
        assert!(store.token().is_none());
        assert!(!ctx.auth.reader().is_authenticated());
    }

    #[test]
    fn test_shell_verbose_toggle() {
        let mock = MockTransport::new();
        let ctx = context(&mock, Rc::new(MemorySessionStore::new()));
        assert!(handle_shell_command(&ctx, "/verbose"));
        assert!(ctx.request_log.verbose());
        assert!(!handle_shell_command(&ctx, "/exit"));
    }
}
