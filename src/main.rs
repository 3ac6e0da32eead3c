mod admin;
mod auth;
mod cart;
mod catalog;
mod cli;
mod commands;
mod config;
mod http;
mod middleware;
mod navigation;
mod orders;
mod render;
mod schema;
mod seq;
mod session;
mod transcript;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "shop", about = "Storefront client: browse, buy and administer a shop")]
pub struct Args {
    #[arg(long, env = "STOREFRONT_API_URL", help = "API root (e.g. http://localhost:8000/api)")]
    pub api_url: Option<String>,

    #[arg(long, env = "STOREFRONT_ADMIN_URL", help = "Admin API root (defaults to <api-url>/admin)")]
    pub admin_url: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Directory holding the saved session")]
    pub session_dir: Option<PathBuf>,

    #[arg(long, help = "Keep the session in memory only")]
    pub ephemeral: bool,

    #[arg(long, help = "Do not write a transcript for this run")]
    pub no_transcript: bool,

    #[arg(long, help = "Skip confirmation prompts for deletes")]
    pub yes: bool,

    #[arg(long, help = "Verbose output (print every request)")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (print settings)")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<commands::Command>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: ignoring unreadable config: {}", e);
            config::Config::default()
        })
    };

    // CLI and environment override config files
    if let Some(url) = &args.api_url {
        cfg.api.base_url = Some(url.clone());
    }
    if let Some(url) = &args.admin_url {
        cfg.api.admin_base_url = Some(url.clone());
    }
    if let Some(dir) = &args.session_dir {
        cfg.session.dir = Some(dir.clone());
    }
    if args.no_transcript {
        cfg.transcript.enabled = Some(false);
    }

    if let Err(errors) = cfg.validate() {
        for error in &errors {
            eprintln!("Config error {}", error);
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }

    let base_url = cfg.api.base_url();
    let admin_base_url = cfg.api.admin_base_url();

    if args.debug {
        eprintln!("[DEBUG] API root: {}", base_url);
        eprintln!("[DEBUG] Admin API root: {}", admin_base_url);
        eprintln!("[DEBUG] Timeout: {} ms", cfg.api.timeout_ms());
        if args.ephemeral {
            eprintln!("[DEBUG] Session: in memory");
        } else {
            eprintln!("[DEBUG] Session dir: {}", cfg.session.dir().display());
        }
    }

    let store: Rc<dyn session::SessionStore> = if args.ephemeral {
        Rc::new(session::MemorySessionStore::new())
    } else {
        Rc::new(session::FileSessionStore::new(&cfg.session.dir()))
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    let transcript = if cfg.transcript.enabled() {
        let dir = cfg.transcript.dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create transcript dir: {}", dir.display()))?;
        let path = dir.join(format!("{}.jsonl", run_id));
        if args.debug {
            eprintln!("[DEBUG] Transcript: {}", path.display());
        }
        transcript::Transcript::new(&path, &run_id)
            .with_context(|| format!("Failed to open transcript: {}", path.display()))?
    } else {
        transcript::Transcript::disabled(&run_id)
    };

    let transport = Rc::new(http::UreqTransport::new(cfg.api.timeout_ms()));
    let ctx = cli::Context::build(
        cli::Wiring {
            base_url: &base_url,
            admin_base_url: &admin_base_url,
            run_id: &run_id,
            verbose: args.verbose,
            yes: args.yes,
        },
        transport,
        store,
        transcript.shared(),
    );
    ctx.auth.hydrate();

    match args.command {
        Some(command) => cli::run_once(&ctx, command),
        None => cli::run_repl(ctx),
    }
}
