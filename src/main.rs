mod calc;
mod config;
mod db;
mod error;
mod http;
mod ipc;
mod logging;
mod model;
mod passwords;
mod service;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "attendd", version, about = "Role-based attendance tracker")]
struct Cli {
    /// TOML config file; falls back to $ATTENDD_CONFIG, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the URL-encoded form endpoints over HTTP.
    Serve,
}

fn run_sidecar(cfg: config::Cfg) {
    let mut state = ipc::AppState::new(cfg);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Unparseable request line: {}", &e);
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    let cfg = match config::Cfg::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{}", &e);
            eprintln!("{}", &e);
            std::process::exit(2);
        }
    };
    log::debug!("Configuration: {:?}", &cfg);

    match cli.command {
        None => run_sidecar(cfg),
        Some(Command::Serve) => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Unable to start async runtime: {}", &e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(http::serve(cfg)) {
                log::error!("Server exited: {:#}", &e);
                eprintln!("{:#}", &e);
                std::process::exit(1);
            }
        }
    }
}
