//! `roverdeck` – RoverDeck operator console
//!
//! This binary wires the console together and hands the terminal to the
//! operator.  It:
//!
//! 1. Initialises tracing (`RUST_LOG`, `ROVERDECK_LOG_FORMAT`, optional OTLP).
//! 2. Loads `~/.roverdeck/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 3. Starts the control task with a lazily connected [`TransportChannel`]
//!    and the host-fed gamepad, then the cockpit feed server for UI hosts.
//! 4. Drops the operator into an **interactive REPL**.
//! 5. Intercepts **Ctrl-C** to release every held control, close the link
//!    and exit.

mod config;
mod repl;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use roverdeck_cockpit::CockpitServer;
use roverdeck_hal::SharedGamepad;
use roverdeck_middleware::{CommandSink, EventBus, TransportChannel};
use roverdeck_runtime::{Console, ConsoleHandle, ConsoleInput, TracingConfig, init_tracing};
use tracing::{error, warn};

fn main() {
    // The guard flushes spans on drop, so it lives until main returns.
    let _tracing = init_tracing(&TracingConfig::from_env("roverdeck"));

    print_banner();

    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the Tokio runtime");
            std::process::exit(1);
        }
    };

    // ── Control task ──────────────────────────────────────────────────────
    let link = Arc::new(TransportChannel::new(cfg.control_url.clone()));
    let sink: Arc<dyn CommandSink> = link.clone();
    let gamepad = SharedGamepad::new();
    let (console, console_task) = rt.block_on(async {
        let (console, task) = Console::new(
            cfg.console_config(),
            sink,
            Box::new(gamepad.clone()),
            EventBus::default(),
        )
        .spawn();
        // Telemetry and gamepad polling run from the start; the REPL can
        // turn either off.
        for input in [ConsoleInput::TelemetryConnect, ConsoleInput::GamepadStart] {
            if let Err(e) = console.send(input).await {
                warn!(error = %e, "console rejected startup input");
            }
        }
        // Dial the vehicle now rather than on the first command.
        link.ensure_connection();
        (console, task)
    });

    // ── Cockpit feed server ───────────────────────────────────────────────
    let cockpit = CockpitServer::new(console.clone(), gamepad).with_port(cfg.cockpit_port);
    rt.spawn(async move {
        if let Err(e) = cockpit.run().await {
            warn!(error = %e, "cockpit server unavailable");
        }
    });

    println!("  Control link : {}", cfg.control_url.dimmed());
    println!(
        "  Cockpit feed : {}",
        format!("ws://localhost:{}", cfg.cockpit_port).dimmed()
    );
    println!();
    println!("  Type {} for a list of commands.\n", "help".bold().cyan());

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        let console = console.clone();
        let link = link.clone();
        let handle = rt.handle().clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – releasing controls …".yellow().bold());
            shutdown.store(true, Ordering::SeqCst);
            stop_console(&handle, &console);
            link.close();
            println!("{}", "  ✓ Controls released, control link closed.".green());
            // The REPL thread may be parked in a blocking stdin read.
            std::process::exit(0);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
        }
    }

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(console.clone(), link.clone(), rt.handle().clone(), shutdown);

    stop_console(rt.handle(), &console);
    if let Err(e) = rt.block_on(console_task) {
        warn!(error = %e, "console task ended abnormally");
    }
    link.close();
    rt.shutdown_timeout(Duration::from_millis(500));
}

/// Ask the control task to release everything and wait until it has.
fn stop_console(rt: &tokio::runtime::Handle, console: &ConsoleHandle) {
    rt.block_on(async {
        // An error only means the task has already stopped.
        let _ = console.shutdown().await;
        console.closed().await;
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      RoverDeck First-Run Wizard      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's point the console at a vehicle.\n");

    let mut cfg = config::Config::default();

    cfg.control_url = prompt_line(
        &format!("  Vehicle control URL [{}]: ", cfg.control_url),
        &cfg.control_url,
    );

    let port_str = prompt_line(
        &format!("  Cockpit feed port [{}]: ", cfg.cockpit_port),
        &cfg.cockpit_port.to_string(),
    );
    if let Ok(p) = port_str.trim().parse::<u16>() {
        cfg.cockpit_port = p;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                    ___          _    "#.bold().cyan());
    println!("{}", r#"  / _ \_____ _____ _ _   |   \ ___ __| |__ "#.bold().cyan());
    println!("{}", r#" |   / _ \ V / -_) '_|  | |) / -_) _| / / "#.bold().cyan());
    println!("{}", r#" |_|_\___/\_/\___|_|    |___/\___\__|_\_\ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "RoverDeck".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Remote Vehicle Operator Console");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
