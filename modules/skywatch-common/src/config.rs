use std::env;
use std::path::PathBuf;

/// Topics the agent considers on-mission. Matched case-insensitively as
/// substrings; order here is the order extraction results come back in.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "language model",
    "llm",
    "agent",
    "alignment",
    "neural",
    "open source",
    "programming",
    "rust",
    "python",
    "atproto",
    "bluesky",
    "decentralized",
    "federation",
];

/// Ascending polling intervals in minutes; the level one past the end is the
/// terminal silence window measured in hours.
pub const DEFAULT_BACKOFF_INTERVALS_MIN: &[u32] = &[10, 20, 40, 80, 160, 240];

/// The agent's own identity on the network.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub did: String,
    pub handle: String,
}

impl AgentIdentity {
    pub fn from_env() -> Self {
        Self {
            did: required_env("SKYWATCH_DID"),
            handle: required_env("SKYWATCH_HANDLE"),
        }
    }
}

/// Engine configuration. Injected at construction so tests run with explicit
/// values instead of module globals or filesystem coupling.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub vocabulary: Vec<String>,
    pub backoff_intervals_min: Vec<u32>,
    /// Hours of silence tolerated at the terminal backoff level before the
    /// thread should be retired from monitoring.
    pub silence_window_hours: i64,
    /// Minimum overall score for a thread to earn a monitoring job.
    pub relevance_threshold: f64,
    /// Minimum agent+counterpart turns for a thread to earn a monitoring job.
    pub min_exchange_depth: u32,
    /// Reply-tree fetch depth.
    pub thread_depth: u32,
    /// Notifications pulled per discovery pass.
    pub notification_limit: u32,
    /// Lookback window for the passive notification peek, minutes.
    pub peek_lookback_min: i64,
    /// Evaluated-notification log cap, applied on every save.
    pub evaluated_cap: usize,
    /// How many of the agent's own reply texts to retain per thread.
    pub recent_reply_history: usize,
    pub state_path: PathBuf,
    /// Delivery channel for monitoring-job payloads.
    pub deliver_channel: String,
    /// Delivery recipient for monitoring-job payloads.
    pub deliver_to: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            vocabulary: DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
            backoff_intervals_min: DEFAULT_BACKOFF_INTERVALS_MIN.to_vec(),
            silence_window_hours: 24,
            relevance_threshold: 60.0,
            min_exchange_depth: 3,
            thread_depth: 20,
            notification_limit: 50,
            peek_lookback_min: 10,
            evaluated_cap: 500,
            recent_reply_history: 5,
            state_path: PathBuf::from("skywatch-state.json"),
            deliver_channel: "dm".to_string(),
            deliver_to: "operator".to_string(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var("SKYWATCH_VOCABULARY") {
            config.vocabulary = raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        config.silence_window_hours =
            parsed_env("SKYWATCH_SILENCE_HOURS", config.silence_window_hours);
        config.relevance_threshold =
            parsed_env("SKYWATCH_RELEVANCE_THRESHOLD", config.relevance_threshold);
        config.min_exchange_depth =
            parsed_env("SKYWATCH_MIN_EXCHANGE_DEPTH", config.min_exchange_depth);
        config.notification_limit =
            parsed_env("SKYWATCH_NOTIFICATION_LIMIT", config.notification_limit);
        if let Ok(path) = env::var("SKYWATCH_STATE_PATH") {
            config.state_path = PathBuf::from(path);
        }
        if let Ok(channel) = env::var("SKYWATCH_CHANNEL") {
            config.deliver_channel = channel;
        }
        if let Ok(to) = env::var("SKYWATCH_DELIVER_TO") {
            config.deliver_to = to;
        }
        config
    }

    /// Interval table length; `backoff_level == terminal_level()` means the
    /// thread sits in the silence window.
    pub fn terminal_level(&self) -> u32 {
        self.backoff_intervals_min.len() as u32
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number")),
        Err(_) => default,
    }
}
