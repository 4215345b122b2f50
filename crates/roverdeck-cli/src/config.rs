//! Console configuration – reads/writes `~/.roverdeck/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use roverdeck_control::SamplerConfig;
use roverdeck_middleware::DEFAULT_CONTROL_URL;
use roverdeck_runtime::{ConsoleConfig, SimulatorConfig, console::poll_interval};
use roverdeck_types::DeckError;
use serde::{Deserialize, Serialize};

/// Persisted operator configuration stored in `~/.roverdeck/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the vehicle's control service.
    #[serde(default = "default_control_url")]
    pub control_url: String,

    /// Port of the cockpit feed server for UI hosts.
    #[serde(default = "default_cockpit_port")]
    pub cockpit_port: u16,

    #[serde(default = "default_telemetry_period_ms")]
    pub telemetry_period_ms: u64,

    #[serde(default = "default_gamepad_poll_hz")]
    pub gamepad_poll_hz: u32,

    /// Stick deflections at or below this magnitude read as zero.
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f64,

    /// How long an absolute yaw from the dial pins the simulated heading.
    #[serde(default = "default_manual_yaw_hold_ms")]
    pub manual_yaw_hold_ms: u64,
}

fn default_control_url() -> String {
    DEFAULT_CONTROL_URL.to_string()
}
fn default_cockpit_port() -> u16 {
    8080
}
fn default_telemetry_period_ms() -> u64 {
    1500
}
fn default_gamepad_poll_hz() -> u32 {
    60
}
fn default_dead_zone() -> f64 {
    0.12
}
fn default_manual_yaw_hold_ms() -> u64 {
    600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_url: default_control_url(),
            cockpit_port: default_cockpit_port(),
            telemetry_period_ms: default_telemetry_period_ms(),
            gamepad_poll_hz: default_gamepad_poll_hz(),
            dead_zone: default_dead_zone(),
            manual_yaw_hold_ms: default_manual_yaw_hold_ms(),
        }
    }
}

impl Config {
    /// Runtime settings for the control task.
    pub fn console_config(&self) -> ConsoleConfig {
        ConsoleConfig {
            simulator: SimulatorConfig {
                period: Duration::from_millis(self.telemetry_period_ms.max(1)),
                manual_hold: Duration::from_millis(self.manual_yaw_hold_ms),
            },
            sampler: SamplerConfig {
                dead_zone: self.dead_zone.clamp(0.0, 0.99),
                ..SamplerConfig::default()
            },
            gamepad_poll_interval: poll_interval(self.gamepad_poll_hz),
        }
    }
}

/// Return the path to `~/.roverdeck/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".roverdeck").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, DeckError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, DeckError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        DeckError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| DeckError::Config(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ROVERDECK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVERDECK_CONTROL_URL` | `control_url` |
/// | `ROVERDECK_COCKPIT_PORT` | `cockpit_port` |
/// | `ROVERDECK_TELEMETRY_PERIOD_MS` | `telemetry_period_ms` |
/// | `ROVERDECK_GAMEPAD_POLL_HZ` | `gamepad_poll_hz` |
/// | `ROVERDECK_DEAD_ZONE` | `dead_zone` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROVERDECK_CONTROL_URL")
        && !v.trim().is_empty()
    {
        cfg.control_url = v;
    }
    if let Some(port) = env_parse("ROVERDECK_COCKPIT_PORT") {
        cfg.cockpit_port = port;
    }
    if let Some(ms) = env_parse("ROVERDECK_TELEMETRY_PERIOD_MS") {
        cfg.telemetry_period_ms = ms;
    }
    if let Some(hz) = env_parse("ROVERDECK_GAMEPAD_POLL_HZ") {
        cfg.gamepad_poll_hz = hz;
    }
    if let Some(dz) = env_parse::<f64>("ROVERDECK_DEAD_ZONE")
        && dz.is_finite()
    {
        cfg.dead_zone = dz;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Save the config to disk, creating `~/.roverdeck/` if necessary.
pub fn save(cfg: &Config) -> Result<(), DeckError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), DeckError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DeckError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                DeckError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| DeckError::Config(format!("failed to serialize config: {e}")))?;
    let write_err =
        |e: std::io::Error| DeckError::Config(format!("failed to write config at {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
