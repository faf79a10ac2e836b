use napi_derive::napi;

// =============================================================================
// N-API INPUT (Node.js → Rust)
// =============================================================================

/// Configuration for a dashboard session.
/// Passed from Node.js via `initSession()`.
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Server base URL (e.g. "http://localhost:3001")
    pub base_url: String,

    /// SSE endpoint path (default: "/events")
    pub events_path: Option<String>,

    /// Resolution report endpoint path (default: "/api/signals/resolution")
    pub report_path: Option<String>,

    /// Status poll endpoint path (default: "/api/status")
    pub status_path: Option<String>,

    /// Bearer token sent on REST calls (default: none)
    pub auth_token: Option<String>,

    /// Fixed reconnection delay in milliseconds (default: 3000)
    pub reconnect_delay_ms: Option<i64>,

    /// Maximum reconnection attempts before giving up (default: unlimited = -1)
    pub max_reconnect_attempts: Option<i32>,

    /// Status poll interval in milliseconds, 0 disables (default: 5000)
    pub status_poll_interval_ms: Option<i64>,

    /// How long a WIN/LOSS stays on the card before searching again (default: 5000)
    pub resolution_display_ms: Option<i64>,

    /// Resolution dedup / reconciliation window in milliseconds (default: 8000)
    pub dedup_window_ms: Option<i64>,

    /// Recent results kept in memory (default: 50)
    pub history_capacity: Option<i32>,

    /// Attempts granted to locally detected signals, 2 or 3 (default: 3)
    pub default_max_attempts: Option<i32>,

    /// Run the local pattern detector (default: true)
    pub local_detection: Option<bool>,

    /// POST locally resolved signals to the server (default: true)
    pub report_local_resolutions: Option<bool>,

    /// Cooldown profile name: "blaze" | "verabet" (default: "blaze")
    pub cooldown_profile: Option<String>,

    /// Per-field overrides on top of the selected profile
    pub cooldown: Option<CooldownOverrides>,

    /// Enable verbose tracing logs (default: false)
    pub verbose: Option<bool>,
}

/// Optional overrides for individual cooldown parameters.
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct CooldownOverrides {
    pub basic_rounds: Option<i32>,
    pub after_loss_rounds: Option<i32>,
    pub stop_rounds: Option<i32>,
    pub min_after_win_rounds: Option<i32>,
    pub window_rounds: Option<i32>,
    pub max_alerts_per_window: Option<i32>,
}

impl SessionConfig {
    pub fn events_path(&self) -> &str {
        self.events_path.as_deref().unwrap_or("/events")
    }

    pub fn report_path(&self) -> &str {
        self.report_path
            .as_deref()
            .unwrap_or("/api/signals/resolution")
    }

    pub fn status_path(&self) -> &str {
        self.status_path.as_deref().unwrap_or("/api/status")
    }

    pub fn reconnect_delay_ms(&self) -> i64 {
        self.reconnect_delay_ms.unwrap_or(3_000)
    }

    pub fn max_reconnect_attempts(&self) -> Option<u32> {
        match self.max_reconnect_attempts {
            Some(n) if n >= 0 => Some(n as u32),
            _ => None, // unlimited
        }
    }

    pub fn status_poll_interval_ms(&self) -> i64 {
        self.status_poll_interval_ms.unwrap_or(5_000)
    }

    pub fn resolution_display_ms(&self) -> i64 {
        self.resolution_display_ms.unwrap_or(5_000)
    }

    pub fn dedup_window_ms(&self) -> i64 {
        self.dedup_window_ms.unwrap_or(8_000)
    }

    pub fn history_capacity(&self) -> i32 {
        self.history_capacity.unwrap_or(50)
    }

    pub fn default_max_attempts(&self) -> i32 {
        self.default_max_attempts.unwrap_or(3)
    }

    pub fn local_detection(&self) -> bool {
        self.local_detection.unwrap_or(true)
    }

    pub fn report_local_resolutions(&self) -> bool {
        self.report_local_resolutions.unwrap_or(true)
    }

    pub fn cooldown_profile(&self) -> &str {
        self.cooldown_profile.as_deref().unwrap_or("blaze")
    }

    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }

    /// Validate and resolve every default. Fails fast on the first bad field.
    pub fn validate(&self) -> Result<SessionSettings, ConfigError> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        let mut cooldown = CooldownProfile::by_name(self.cooldown_profile())
            .ok_or_else(|| ConfigError::UnknownProfile(self.cooldown_profile().to_string()))?;
        if let Some(ref o) = self.cooldown {
            cooldown.apply_overrides(o)?;
        }
        cooldown.validate()?;

        let max_attempts = self.default_max_attempts();
        if !(2..=3).contains(&max_attempts) {
            return Err(ConfigError::InvalidValue {
                field: "defaultMaxAttempts",
                value: max_attempts as i64,
            });
        }

        let history_capacity = self.history_capacity();
        if history_capacity < 10 {
            // The balance detector looks at the newest 10 rounds.
            return Err(ConfigError::InvalidValue {
                field: "historyCapacity",
                value: history_capacity as i64,
            });
        }

        Ok(SessionSettings {
            base_url,
            events_path: self.events_path().to_string(),
            report_path: self.report_path().to_string(),
            status_path: self.status_path().to_string(),
            auth_token: self.auth_token.clone().filter(|t| !t.is_empty()),
            reconnect_delay_ms: non_negative("reconnectDelayMs", self.reconnect_delay_ms())?,
            max_reconnect_attempts: self.max_reconnect_attempts(),
            status_poll_interval_ms: non_negative(
                "statusPollIntervalMs",
                self.status_poll_interval_ms(),
            )?,
            resolution_display_ms: non_negative(
                "resolutionDisplayMs",
                self.resolution_display_ms(),
            )?,
            dedup_window_ms: non_negative("dedupWindowMs", self.dedup_window_ms())? as i64,
            history_capacity: history_capacity as usize,
            default_max_attempts: max_attempts as u32,
            local_detection: self.local_detection(),
            report_local_resolutions: self.report_local_resolutions(),
            cooldown,
            verbose: self.verbose(),
        })
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64, ConfigError> {
    if value < 0 {
        return Err(ConfigError::InvalidValue { field, value });
    }
    Ok(value as u64)
}

// =============================================================================
// VALIDATED SETTINGS (Rust-only)
// =============================================================================

/// Fully resolved session settings, produced by `SessionConfig::validate()`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub base_url: String,
    pub events_path: String,
    pub report_path: String,
    pub status_path: String,
    pub auth_token: Option<String>,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: Option<u32>,
    pub status_poll_interval_ms: u64,
    pub resolution_display_ms: u64,
    pub dedup_window_ms: i64,
    pub history_capacity: usize,
    pub default_max_attempts: u32,
    pub local_detection: bool,
    pub report_local_resolutions: bool,
    pub cooldown: CooldownProfile,
    pub verbose: bool,
}

impl SessionSettings {
    pub fn events_url(&self) -> String {
        format!("{}{}", self.base_url, self.events_path)
    }
}

// =============================================================================
// COOLDOWN PROFILE
// =============================================================================

/// Cooldown governor parameters. All counts are in rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownProfile {
    pub basic_rounds: u32,
    pub after_loss_rounds: u32,
    pub stop_rounds: u32,
    pub min_after_win_rounds: u32,
    pub window_rounds: u32,
    pub max_alerts_per_window: u32,
}

impl CooldownProfile {
    /// Blaze dashboard: 7/12/20/3, 3 alerts per 50 rounds.
    pub const BLAZE: CooldownProfile = CooldownProfile {
        basic_rounds: 7,
        after_loss_rounds: 12,
        stop_rounds: 20,
        min_after_win_rounds: 3,
        window_rounds: 50,
        max_alerts_per_window: 3,
    };

    /// Verabet dashboard: 4/8/12/3, 4 alerts per 30 rounds.
    pub const VERABET: CooldownProfile = CooldownProfile {
        basic_rounds: 4,
        after_loss_rounds: 8,
        stop_rounds: 12,
        min_after_win_rounds: 3,
        window_rounds: 30,
        max_alerts_per_window: 4,
    };

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "blaze" => Some(Self::BLAZE),
            "verabet" => Some(Self::VERABET),
            _ => None,
        }
    }

    fn apply_overrides(&mut self, o: &CooldownOverrides) -> Result<(), ConfigError> {
        let fields: [(&'static str, Option<i32>, &mut u32); 6] = [
            ("cooldown.basicRounds", o.basic_rounds, &mut self.basic_rounds),
            ("cooldown.afterLossRounds", o.after_loss_rounds, &mut self.after_loss_rounds),
            ("cooldown.stopRounds", o.stop_rounds, &mut self.stop_rounds),
            ("cooldown.minAfterWinRounds", o.min_after_win_rounds, &mut self.min_after_win_rounds),
            ("cooldown.windowRounds", o.window_rounds, &mut self.window_rounds),
            ("cooldown.maxAlertsPerWindow", o.max_alerts_per_window, &mut self.max_alerts_per_window),
        ];
        for (field, value, slot) in fields {
            if let Some(v) = value {
                if v < 0 {
                    return Err(ConfigError::InvalidValue {
                        field,
                        value: v as i64,
                    });
                }
                *slot = v as u32;
            }
        }
        Ok(())
    }

    /// Reject parameters that would make the governor always or never admit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cooldown.windowRounds",
                value: 0,
            });
        }
        if self.max_alerts_per_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cooldown.maxAlertsPerWindow",
                value: 0,
            });
        }
        if self.stop_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cooldown.stopRounds",
                value: 0,
            });
        }
        Ok(())
    }
}

impl Default for CooldownProfile {
    fn default() -> Self {
        Self::BLAZE
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingBaseUrl,
    InvalidBaseUrl(String),
    UnknownProfile(String),
    InvalidValue { field: &'static str, value: i64 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingBaseUrl => write!(f, "baseUrl is required"),
            ConfigError::InvalidBaseUrl(url) => {
                write!(f, "baseUrl must start with http:// or https://: {}", url)
            }
            ConfigError::UnknownProfile(name) => write!(f, "Unknown cooldown profile: {}", name),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value for {}: {}", field, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// TESTS
// =============================================================================
