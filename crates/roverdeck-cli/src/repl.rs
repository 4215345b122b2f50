//! REPL – line-oriented operator shell for the RoverDeck console.
//!
//! Supported commands (a leading `/` is optional):
//!   press <key> | release <key>     – keyboard edge (`w a s d`, `arrowup` …)
//!   mode [eco|normal|boost]         – set or cycle the drive mode
//!   steering [2wd|4wd]              – set or cycle the steering mode
//!   camera <id> | pan <direction>   – camera selection and nudges
//!   led <front|sweep> | laser <front|sweep> | intensity <0-100> | profile
//!   yaw <degrees> | yaw clear       – pin or release the simulated heading
//!   telemetry on|off | gamepad on|off
//!   status | help | quit

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use roverdeck_middleware::TransportChannel;
use roverdeck_runtime::{ConsoleHandle, ConsoleInput};
use roverdeck_types::{DeckError, DriveMode, Key, KeySource, LightTarget, PanDirection, SteeringMode};
use tokio::runtime::Handle;

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Press(Key),
    Release(Key),
    /// `None` cycles.
    Mode(Option<DriveMode>),
    Steering(Option<SteeringMode>),
    Camera(String),
    Pan(PanDirection),
    Led(LightTarget),
    Laser(LightTarget),
    Intensity(i32),
    Profile,
    /// `None` clears the pin.
    Yaw(Option<f64>),
    Telemetry(bool),
    Gamepad(bool),
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = DeckError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or("").to_lowercase();
        let arg = words.next();
        if words.next().is_some() {
            return Err(DeckError::InvalidInput(format!("too many arguments for '{verb}'")));
        }

        let cmd = match (verb.as_str(), arg) {
            ("help", None) => Command::Help,
            ("press", Some(key)) => Command::Press(key.parse()?),
            ("release", Some(key)) => Command::Release(key.parse()?),
            ("mode", mode) => Command::Mode(mode.map(str::parse::<DriveMode>).transpose()?),
            ("steering", mode) => Command::Steering(mode.map(str::parse::<SteeringMode>).transpose()?),
            ("camera", Some(id)) => Command::Camera(id.to_string()),
            ("pan", Some(direction)) => Command::Pan(parse_direction(direction)?),
            ("led", Some(target)) => Command::Led(target.parse()?),
            ("laser", Some(target)) => Command::Laser(target.parse()?),
            ("intensity", Some(value)) => Command::Intensity(
                value
                    .parse()
                    .map_err(|_| DeckError::InvalidInput(format!("'{value}' is not an intensity")))?,
            ),
            ("profile", None) => Command::Profile,
            ("yaw", Some("clear")) => Command::Yaw(None),
            ("yaw", Some(degrees)) => match degrees.parse::<f64>() {
                Ok(d) if d.is_finite() => Command::Yaw(Some(d)),
                _ => return Err(DeckError::InvalidInput(format!("'{degrees}' is not an angle"))),
            },
            ("telemetry", Some(state)) => Command::Telemetry(parse_on_off(state)?),
            ("gamepad", Some(state)) => Command::Gamepad(parse_on_off(state)?),
            ("status", None) => Command::Status,
            ("quit" | "exit", None) => Command::Quit,
            ("", _) => return Err(DeckError::InvalidInput("empty command".to_string())),
            _ => return Err(DeckError::InvalidInput(format!("unknown command '{line}'"))),
        };
        Ok(cmd)
    }
}

impl Command {
    /// The console input this command stands for; `None` for commands the
    /// REPL answers itself.
    pub fn into_input(self) -> Option<ConsoleInput> {
        let keyboard = KeySource::Keyboard;
        let input = match self {
            Command::Press(key) => ConsoleInput::Key {
                source: keyboard,
                key,
                active: true,
            },
            Command::Release(key) => ConsoleInput::Key {
                source: keyboard,
                key,
                active: false,
            },
            Command::Mode(Some(mode)) => ConsoleInput::DriveMode(mode),
            Command::Mode(None) => ConsoleInput::CycleDriveMode,
            Command::Steering(Some(mode)) => ConsoleInput::SteeringMode(mode),
            Command::Steering(None) => ConsoleInput::CycleSteering,
            Command::Camera(id) => ConsoleInput::SelectCamera(id),
            Command::Pan(direction) => ConsoleInput::PanCamera(direction),
            Command::Led(target) => ConsoleInput::ToggleLed(target),
            Command::Laser(target) => ConsoleInput::ToggleLaser(target),
            Command::Intensity(value) => ConsoleInput::LedIntensity(value),
            Command::Profile => ConsoleInput::CycleDisplayProfile,
            Command::Yaw(Some(degrees)) => ConsoleInput::ManualYaw(degrees),
            Command::Yaw(None) => ConsoleInput::ClearManualYaw,
            Command::Telemetry(true) => ConsoleInput::TelemetryConnect,
            Command::Telemetry(false) => ConsoleInput::TelemetryDisconnect,
            Command::Gamepad(true) => ConsoleInput::GamepadStart,
            Command::Gamepad(false) => ConsoleInput::GamepadStop,
            Command::Help | Command::Status | Command::Quit => return None,
        };
        Some(input)
    }
}

fn parse_direction(s: &str) -> Result<PanDirection, DeckError> {
    match s.to_lowercase().as_str() {
        "up" => Ok(PanDirection::Up),
        "down" => Ok(PanDirection::Down),
        "left" => Ok(PanDirection::Left),
        "right" => Ok(PanDirection::Right),
        other => Err(DeckError::InvalidInput(format!("unknown direction '{other}'"))),
    }
}

fn parse_on_off(s: &str) -> Result<bool, DeckError> {
    match s.to_lowercase().as_str() {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(DeckError::InvalidInput(format!("expected on|off, got '{other}'"))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// Runs on the calling (non-runtime) thread and drives the console through
/// `rt`.  `shutdown` is polled each iteration; when set the REPL exits.
pub fn run(console: ConsoleHandle, link: Arc<TransportChannel>, rt: Handle, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "roverdeck>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        let cmd = match line.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{} Type {} for available commands.", e.to_string().red(), "help".bold());
                continue;
            }
        };

        match cmd {
            Command::Help => print_help(),
            Command::Status => print_status(&console, &link, &rt),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            other => {
                let Some(input) = other.into_input() else {
                    continue;
                };
                if let Err(e) = rt.block_on(console.send(input)) {
                    println!("{}: {}", "Console error".red(), e);
                    break;
                }
            }
        }
    }
}

fn print_help() {
    println!();
    println!("{}", "RoverDeck Commands".bold().underline());
    println!("  {}  – key down / up (w a s d, arrowup …)", "press <key>  release <key>".bold().cyan());
    println!("  {}         – set or cycle drive mode", "mode [eco|normal|boost]".bold().cyan());
    println!("  {}             – set or cycle steering", "steering [2wd|4wd]".bold().cyan());
    println!("  {}        – camera selection and nudges", "camera <id>  pan <dir>".bold().cyan());
    println!("  {} – light and laser toggles", "led <front|sweep>  laser <front|sweep>".bold().cyan());
    println!("  {}       – LED intensity, display profile", "intensity <0-100>  profile".bold().cyan());
    println!("  {}           – pin or release the heading", "yaw <deg>  yaw clear".bold().cyan());
    println!("  {}  – start / stop a feed", "telemetry on|off  gamepad on|off".bold().cyan());
    println!("  {}                – console and link status", "status".bold().cyan());
    println!("  {}                  – release everything and exit", "quit".bold().cyan());
    println!();
}

fn print_status(console: &ConsoleHandle, link: &TransportChannel, rt: &Handle) {
    let status = match rt.block_on(console.status()) {
        Ok(status) => status,
        Err(e) => {
            println!("{}: {}", "Console error".red(), e);
            return;
        }
    };
    let on_off = |on: bool| if on { "on".green() } else { "off".dimmed() };
    let keys: Vec<&str> = status.control.active_keys.iter().map(|k| k.as_str()).collect();
    let keys = if keys.is_empty() { "-".to_string() } else { keys.join(" ") };
    let stats = link.stats();

    println!("{}", "Console Status".bold().underline());
    println!("  Active keys : {}", keys.yellow());
    println!(
        "  Throttle    : {:>3.0}%   Brake: {:>3.0}%",
        status.control.throttle * 100.0,
        status.control.brake * 100.0
    );
    println!(
        "  Drive mode  : {}   Steering: {}",
        status.control.drive_mode.to_string().bold(),
        status.control.steering_mode.to_string().bold()
    );
    println!("  LED         : {}%", status.led_intensity);
    println!(
        "  Telemetry   : {} ({} ticks)",
        on_off(status.telemetry_running),
        status.telemetry_ticks
    );
    println!(
        "  Gamepad     : {} ({})",
        on_off(status.gamepad_running),
        if status.gamepad_connected { "connected".green() } else { "no controller".dimmed() }
    );
    println!(
        "  Control link: {} {}  sent {} / dropped {} / attempts {}",
        link.status().to_string().bold(),
        link.url().dimmed(),
        stats.sent,
        stats.dropped,
        stats.connection_attempts
    );
}
