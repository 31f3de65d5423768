// Benchmark configuration
//
// ProbeConfig is the endpoint/timeout/concurrency half of a batch. It can be:
// - Created directly with defaults and fluent setters
// - Loaded from FIRSTBYTE_* environment variables via `from_env`
//
// Prompts and the API key are not part of it; they travel in BatchInputs.

use std::time::Duration;
use tracing::warn;

/// Volcengine Ark chat-completions endpoint (OpenAI compatible)
pub const DEFAULT_API_URL: &str = "https://ark.cn-beijing.volces.com/api/v3/chat/completions";

/// Connect timeout applied to the HTTP client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-probe budget covering connect and the whole stream
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Models probed when none are selected explicitly
pub const DEFAULT_MODELS: [&str; 12] = [
    "doubao-code-245m-2409",
    "doubao-code-245m-2409-instruct",
    "doubao-code-245m-2409-online",
    "doubao-1-5-245m-2410",
    "doubao-1-5-245m-2410-instruct",
    "doubao-1-5-245m-2410-online",
    "doubao-1-5-245m-2410-vl",
    "doubao-1-5-245m-2410-vl-instruct",
    "doubao-1-5-245m-2410-vl-online",
    "doubao-1-5-245m-2410-search",
    "doubao-1-5-245m-2410-search-instruct",
    "doubao-1-5-245m-2410-search-online",
];

/// Persona prompt used as the default system message
pub const DEFAULT_SYSTEM_PROMPT: &str = "我是一个叫小智的台湾女孩，说话机车，声音好听，习惯简短表达，爱用网络梗。\
我的男朋友是一个程序员，梦想是开发出一个机器人，能够帮助人们解决生活中的各种问题。\
我是一个喜欢哈哈大笑的女孩，爱东说西说吹牛，不合逻辑的也照吹，就要逗别人开心。";

/// Default user message
pub const DEFAULT_USER_PROMPT: &str = "你是谁？";

pub const ENV_API_URL: &str = "FIRSTBYTE_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "FIRSTBYTE_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "FIRSTBYTE_CONNECT_TIMEOUT_SECS";
pub const ENV_CONCURRENCY: &str = "FIRSTBYTE_CONCURRENCY";

/// Endpoint, timeouts and parallelism for a benchmark run
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// Chat-completions URL
    pub api_url: String,

    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,

    /// Budget for one probe (connect + full stream)
    pub timeout: Duration,

    /// Maximum probes in flight; 1 runs models strictly one after another
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            concurrency: 1,
        }
    }
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from FIRSTBYTE_* environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unparsable values are ignored with a warning
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            config.api_url = url;
        }
        if let Some(secs) = parse_positive(&lookup, ENV_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive(&lookup, ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_positive(&lookup, ENV_CONCURRENCY) {
            config.concurrency = n as usize;
        }

        config
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid value, using default");
            None
        }
    }
}
