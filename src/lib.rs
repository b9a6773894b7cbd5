pub mod config;
pub mod error;
pub mod gamification;
pub mod rest;
pub mod storage;

use std::sync::Arc;
use tokio::sync::RwLock;

use config::{HotConfig, ServerConfig};
use gamification::goals::GoalService;
use gamification::updater::GamificationService;
use storage::Storage;

/// Shared application state passed to every request handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub storage: Arc<Storage>,
    /// The only write path for user_stats (XP, level, streak, badges).
    pub gamification: GamificationService,
    pub goals: GoalService,
    /// Hot-reloadable config subset (log level, token TTL). Shared with the
    /// config watcher when hot-reload is active.
    pub hot: Arc<RwLock<HotConfig>>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(config: Arc<ServerConfig>, storage: Arc<Storage>) -> Self {
        let curve = Arc::new(config.curve.clone());
        let gamification = GamificationService::new(
            storage.clone(),
            curve,
            config.gamification.scenario_xp,
            config.gamification.assessment_xp,
        );
        let goals = GoalService::new(storage.clone());
        let hot = Arc::new(RwLock::new(HotConfig {
            log_level: config.log.clone(),
            token_ttl_days: config.token_ttl_days,
        }));
        Self {
            config,
            storage,
            gamification,
            goals,
            hot,
            started_at: std::time::Instant::now(),
        }
    }
}
