use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::gamification::curve::{LevelCurve, LevelingSettings};

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_TOKEN_TTL_DAYS: u32 = 30;
const DEFAULT_SCENARIO_XP: u64 = 50;
const DEFAULT_ASSESSMENT_XP: u64 = 25;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── GamificationConfig ───────────────────────────────────────────────────────

/// XP amounts per event type (`[gamification]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GamificationConfig {
    /// XP for completing a scenario with no per-scenario override (default: 50).
    pub scenario_xp: u64,
    /// XP for submitting a self-assessment (default: 25).
    pub assessment_xp: u64,
}

impl Default for GamificationConfig {
    fn default() -> Self {
        Self {
            scenario_xp: DEFAULT_SCENARIO_XP,
            assessment_xp: DEFAULT_ASSESSMENT_XP,
        }
    }
}

// ─── ObservabilityConfig ─────────────────────────────────────────────────────

/// Daemon observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST server port (default: 4310).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,praxisd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Bind address for the REST server (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// How many days a login token stays valid (default: 30).
    token_ttl_days: Option<u32>,
    /// Level curve configuration (`[leveling]`).
    leveling: Option<LevelingSettings>,
    /// XP award amounts (`[gamification]`).
    gamification: Option<GamificationConfig>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── ServerConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Bind address for the REST server (PRAXISD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// How many days a login token stays valid (0 = never expires… rejected, min 1).
    pub token_ttl_days: u32,
    /// Validated level curve built from `[leveling]`.
    /// A malformed threshold table fails startup, not requests.
    pub curve: LevelCurve,
    pub gamification: GamificationConfig,
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    ///
    /// Fails with a configuration error when the `[leveling]` section is
    /// malformed; that failure is fatal at startup by design.
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("PRAXISD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let bind_address = bind_address
            .or(std::env::var("PRAXISD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let token_ttl_days = toml
            .token_ttl_days
            .unwrap_or(DEFAULT_TOKEN_TTL_DAYS)
            .max(1);

        let curve = LevelCurve::from_settings(&toml.leveling.unwrap_or_default())?;
        let gamification = toml.gamification.unwrap_or_default();
        let observability = toml.observability.unwrap_or_default();

        Ok(Self {
            port,
            data_dir,
            log,
            log_format,
            bind_address,
            token_ttl_days,
            curve,
            gamification,
            observability,
        })
    }
}

// ─── Hot-reloadable config subset ─────────────────────────────────────────────

/// Non-critical config fields that can be changed without restarting the daemon.
#[derive(Debug, Clone)]
pub struct HotConfig {
    pub log_level: String,
    pub token_ttl_days: u32,
}

/// Watches `config.toml` for changes and reloads non-critical fields.
///
/// Uses the `notify` crate (kqueue on macOS, inotify on Linux) to detect file
/// modifications. Only `log` and `token_ttl_days` are reloaded; port, bind
/// address, and the level curve are startup-only and require a restart —
/// re-deriving every stored level against a curve that changed mid-flight is
/// an explicit non-feature.
pub struct ConfigWatcher {
    pub hot: Arc<RwLock<HotConfig>>,
    // Hold the watcher alive; dropping it stops the file watch.
    _watcher: notify_debouncer_full::Debouncer<
        notify_debouncer_full::notify::RecommendedWatcher,
        notify_debouncer_full::FileIdMap,
    >,
}

impl ConfigWatcher {
    /// Start watching `{data_dir}/config.toml` for changes.
    ///
    /// Returns `None` if the watcher could not be created (non-fatal; the
    /// daemon runs fine without hot-reload).
    pub fn start(data_dir: &Path) -> Option<Self> {
        let config_path = data_dir.join("config.toml");
        let initial = load_hot_config(&config_path);
        let hot = Arc::new(RwLock::new(initial));

        let hot_clone = hot.clone();
        let config_path_clone = config_path.clone();
        let rt_handle = tokio::runtime::Handle::current();

        let watcher = notify_debouncer_full::new_debouncer(
            std::time::Duration::from_secs(2),
            None,
            move |result: notify_debouncer_full::DebounceEventResult| {
                if let Ok(events) = result {
                    // Only act on modify/create events
                    let relevant = events.iter().any(|e| {
                        use notify_debouncer_full::notify::EventKind;
                        matches!(e.event.kind, EventKind::Modify(_) | EventKind::Create(_))
                    });
                    if relevant {
                        let hot = hot_clone.clone();
                        let path = config_path_clone.clone();
                        rt_handle.spawn(async move {
                            let new_config = load_hot_config(&path);
                            let mut guard = hot.write().await;
                            if guard.log_level != new_config.log_level
                                || guard.token_ttl_days != new_config.token_ttl_days
                            {
                                info!(
                                    log_level = %new_config.log_level,
                                    token_ttl_days = new_config.token_ttl_days,
                                    "config.toml reloaded"
                                );
                                *guard = new_config;
                            }
                        });
                    }
                }
            },
        );

        match watcher {
            Ok(mut debouncer) => {
                use notify_debouncer_full::notify::Watcher as _;
                // Watch the data_dir (parent of config.toml) since watching a
                // non-existent file fails on some platforms.
                let watch_path = config_path.parent().unwrap_or_else(|| Path::new("."));
                if let Err(e) = debouncer.watcher().watch(
                    watch_path,
                    notify_debouncer_full::notify::RecursiveMode::NonRecursive,
                ) {
                    warn!("config watcher failed to start: {e} — hot-reload disabled");
                    return None;
                }
                info!(path = %config_path.display(), "config hot-reload watcher started");
                Some(Self {
                    hot,
                    _watcher: debouncer,
                })
            }
            Err(e) => {
                warn!("config watcher creation failed: {e} — hot-reload disabled");
                None
            }
        }
    }
}

/// Load only the hot-reloadable fields from config.toml.
fn load_hot_config(path: &Path) -> HotConfig {
    let toml = std::fs::read_to_string(path)
        .ok()
        .and_then(|s| toml::from_str::<TomlConfig>(&s).ok())
        .unwrap_or_default();
    HotConfig {
        log_level: toml.log.unwrap_or_else(|| "info".to_string()),
        token_ttl_days: toml.token_ttl_days.unwrap_or(DEFAULT_TOKEN_TTL_DAYS).max(1),
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/praxisd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("praxisd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/praxisd or ~/.local/share/praxisd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("praxisd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("praxisd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\praxisd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("praxisd");
        }
    }
    // Fallback
    PathBuf::from(".praxisd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let dir = std::env::temp_dir().join(format!("praxisd-cfg-{}", uuid::Uuid::new_v4()));
        let cfg = ServerConfig::new(None, Some(dir), None, None).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.gamification.scenario_xp, DEFAULT_SCENARIO_XP);
        assert!(matches!(cfg.curve, LevelCurve::Linear { base: 100, .. }));
    }

    #[test]
    fn malformed_thresholds_fail_startup() {
        let dir = std::env::temp_dir().join(format!("praxisd-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            "[leveling]\nthresholds = [10, 20]\n",
        )
        .unwrap();
        assert!(ServerConfig::new(None, Some(dir), None, None).is_err());
    }

    #[test]
    fn cli_overrides_toml() {
        let dir = std::env::temp_dir().join(format!("praxisd-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "port = 9000\n").unwrap();
        let cfg = ServerConfig::new(Some(4444), Some(dir), None, None).unwrap();
        assert_eq!(cfg.port, 4444);
    }
}
