//! Configuration types for gexflow
//!
//! One `Config` struct is loaded from TOML at startup, validated eagerly,
//! and passed by reference into every component. Components never read
//! ambient environment state directly; an invalid configuration prevents
//! startup with an error naming the offending field and value.

use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors raised at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Config file could not be parsed as TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value outside its allowed range
    #[error("invalid config field {field} = {value}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        value: value.to_string(),
        reason,
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub gex: GexConfig,
    #[serde(default)]
    pub exit: ExitConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Signal validation thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Minimum seconds between signals for the same (symbol, direction)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Exchange session open, HH:MM in the exchange time zone
    #[serde(default = "default_market_open")]
    pub market_open: String,

    /// Exchange session close, HH:MM in the exchange time zone
    #[serde(default = "default_market_close")]
    pub market_close: String,

    /// IANA time zone of the exchange
    #[serde(default = "default_market_timezone")]
    pub market_timezone: String,

    /// Reject signals older than this many seconds
    #[serde(default = "default_max_signal_age_secs")]
    pub max_signal_age_secs: u64,

    /// Minimum upstream confluence score carried in signal metadata
    #[serde(default = "default_min_confluence_score")]
    pub min_confluence_score: Decimal,

    /// Reject signals whose metadata reports broken MTF alignment
    #[serde(default = "default_true")]
    pub require_mtf_alignment: bool,
}

fn default_cooldown_secs() -> u64 {
    300
}
fn default_market_open() -> String {
    "09:30".to_string()
}
fn default_market_close() -> String {
    "16:00".to_string()
}
fn default_market_timezone() -> String {
    "America/New_York".to_string()
}
fn default_max_signal_age_secs() -> u64 {
    300
}
fn default_min_confluence_score() -> Decimal {
    dec!(0.5)
}
fn default_true() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            market_open: default_market_open(),
            market_close: default_market_close(),
            market_timezone: default_market_timezone(),
            max_signal_age_secs: 300,
            min_confluence_score: dec!(0.5),
            require_mtf_alignment: true,
        }
    }
}

impl ValidationConfig {
    /// Parse the session open time
    pub fn open_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.market_open, "%H:%M").map_err(|_| {
            invalid(
                "validation.market_open",
                &self.market_open,
                "expected HH:MM",
            )
        })
    }

    /// Parse the session close time
    pub fn close_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.market_close, "%H:%M").map_err(|_| {
            invalid(
                "validation.market_close",
                &self.market_close,
                "expected HH:MM",
            )
        })
    }

    /// Parse the exchange time zone
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        Tz::from_str(&self.market_timezone).map_err(|_| {
            invalid(
                "validation.market_timezone",
                &self.market_timezone,
                "unknown IANA time zone",
            )
        })
    }
}

/// Market-condition risk thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Volatility index level above which entries are rejected outright
    #[serde(default = "default_max_volatility")]
    pub max_volatility: Decimal,

    /// Volatility index level above which position size is reduced
    #[serde(default = "default_caution_volatility")]
    pub caution_volatility: Decimal,

    /// Size multiplier applied in the caution band
    #[serde(default = "default_caution_size_factor")]
    pub caution_size_factor: Decimal,

    /// Maximum concurrent open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,

    /// Maximum total entry cost across open positions, in dollars
    #[serde(default = "default_max_exposure")]
    pub max_exposure: Decimal,
}

fn default_max_volatility() -> Decimal {
    dec!(40)
}
fn default_caution_volatility() -> Decimal {
    dec!(30)
}
fn default_caution_size_factor() -> Decimal {
    dec!(0.5)
}
fn default_max_open_positions() -> usize {
    5
}
fn default_max_exposure() -> Decimal {
    dec!(25000)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_volatility: dec!(40),
            caution_volatility: dec!(30),
            caution_size_factor: dec!(0.5),
            max_open_positions: 5,
            max_exposure: dec!(25000),
        }
    }
}

/// Position sizing parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Starting contract count before multipliers
    #[serde(default = "default_base_size")]
    pub base_size: Decimal,

    /// Fractional Kelly applied to the confidence-derived edge
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: Decimal,

    /// Quantities below this are treated as "do not enter" by the caller
    #[serde(default = "default_min_size")]
    pub min_size: i64,

    /// Hard cap on contract quantity
    #[serde(default = "default_max_size")]
    pub max_size: i64,

    /// Multiplier applied in a low volatility regime
    #[serde(default = "default_low_regime_multiplier")]
    pub low_regime_multiplier: Decimal,

    /// Multiplier applied in a high volatility regime
    #[serde(default = "default_high_regime_multiplier")]
    pub high_regime_multiplier: Decimal,

    /// Multiplier for HIGH confluence
    #[serde(default = "default_high_confluence_multiplier")]
    pub high_confluence_multiplier: Decimal,

    /// Multiplier for LOW confluence
    #[serde(default = "default_low_confluence_multiplier")]
    pub low_confluence_multiplier: Decimal,
}

fn default_base_size() -> Decimal {
    dec!(2)
}
fn default_kelly_fraction() -> Decimal {
    dec!(0.5)
}
fn default_min_size() -> i64 {
    1
}
fn default_max_size() -> i64 {
    10
}
fn default_low_regime_multiplier() -> Decimal {
    dec!(1.2)
}
fn default_high_regime_multiplier() -> Decimal {
    dec!(0.7)
}
fn default_high_confluence_multiplier() -> Decimal {
    dec!(1.2)
}
fn default_low_confluence_multiplier() -> Decimal {
    dec!(0.8)
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_size: dec!(2),
            kelly_fraction: dec!(0.5),
            min_size: 1,
            max_size: 10,
            low_regime_multiplier: dec!(1.2),
            high_regime_multiplier: dec!(0.7),
            high_confluence_multiplier: dec!(1.2),
            low_confluence_multiplier: dec!(0.8),
        }
    }
}

/// Confidence scoring parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ConfidenceConfig {
    /// Starting confidence before adjustments, on the 0-100 scale
    #[serde(default = "default_base_confidence")]
    pub base_confidence: Decimal,

    /// Entries below this final confidence are rejected
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Decimal,

    /// Bound on the market-context adjustment (plus or minus)
    #[serde(default = "default_max_context_adjustment")]
    pub max_context_adjustment: Decimal,

    /// Bound on the dealer-positioning adjustment (plus or minus)
    #[serde(default = "default_max_positioning_adjustment")]
    pub max_positioning_adjustment: Decimal,

    /// Bound on the gamma-exposure adjustment (plus or minus)
    #[serde(default = "default_max_gex_adjustment")]
    pub max_gex_adjustment: Decimal,
}

fn default_base_confidence() -> Decimal {
    dec!(50)
}
fn default_min_confidence() -> Decimal {
    dec!(60)
}
fn default_max_context_adjustment() -> Decimal {
    dec!(15)
}
fn default_max_positioning_adjustment() -> Decimal {
    dec!(10)
}
fn default_max_gex_adjustment() -> Decimal {
    dec!(20)
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            base_confidence: dec!(50),
            min_confidence: dec!(60),
            max_context_adjustment: dec!(15),
            max_positioning_adjustment: dec!(10),
            max_gex_adjustment: dec!(20),
        }
    }
}

/// Cache TTLs and deduplication windows
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Market context freshness window in seconds
    #[serde(default = "default_context_ttl_secs")]
    pub context_ttl_secs: u64,

    /// Ceiling on serving a stale context after a failed refresh
    #[serde(default = "default_stale_fallback_secs")]
    pub stale_fallback_secs: u64,

    /// Window within which an identical fingerprint is a duplicate
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,

    /// Fingerprints are forgotten entirely after this many seconds
    #[serde(default = "default_dedup_expiry_secs")]
    pub dedup_expiry_secs: u64,
}

fn default_context_ttl_secs() -> u64 {
    60
}
fn default_stale_fallback_secs() -> u64 {
    300
}
fn default_dedup_window_secs() -> u64 {
    60
}
fn default_dedup_expiry_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            context_ttl_secs: 60,
            stale_fallback_secs: 300,
            dedup_window_secs: 60,
            dedup_expiry_secs: 300,
        }
    }
}

/// Gamma exposure signal parameters
#[derive(Debug, Clone, Deserialize)]
pub struct GexConfig {
    /// Readings older than this many hours are stale
    #[serde(default = "default_stale_threshold_hours")]
    pub stale_threshold_hours: i64,

    /// Weight reduction applied to stale readings (0.5 = half weight)
    #[serde(default = "default_stale_weight_reduction")]
    pub stale_weight_reduction: Decimal,
}

fn default_stale_threshold_hours() -> i64 {
    4
}
fn default_stale_weight_reduction() -> Decimal {
    dec!(0.5)
}

impl Default for GexConfig {
    fn default() -> Self {
        Self {
            stale_threshold_hours: 4,
            stale_weight_reduction: dec!(0.5),
        }
    }
}

/// Exit rule thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ExitConfig {
    /// Take profit once unrealized P&L reaches this percent of entry cost
    #[serde(default = "default_profit_target_pct")]
    pub profit_target_pct: Decimal,

    /// Stop out once unrealized P&L falls below minus this percent
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,

    /// Maximum holding period in hours
    #[serde(default = "default_max_hold_hours")]
    pub max_hold_hours: i64,
}

fn default_profit_target_pct() -> Decimal {
    dec!(50)
}
fn default_stop_loss_pct() -> Decimal {
    dec!(30)
}
fn default_max_hold_hours() -> i64 {
    6
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            profit_target_pct: dec!(50),
            stop_loss_pct: dec!(30),
            max_hold_hours: 6,
        }
    }
}

/// External fetch timeout and retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-attempt timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts before a typed failure is returned
    #[serde(default = "default_fetch_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles per attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    5
}
fn default_fetch_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    250
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            max_attempts: 3,
            initial_backoff_ms: 250,
        }
    }
}

/// Upstream provider endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Market context endpoint
    #[serde(default = "default_context_url")]
    pub context_url: String,

    /// Gamma exposure endpoint
    #[serde(default = "default_gex_url")]
    pub gex_url: String,

    /// Ordered quote endpoints, tried first to last
    #[serde(default = "default_quote_urls")]
    pub quote_urls: Vec<String>,
}

fn default_context_url() -> String {
    "https://api.example.com/v1/context".to_string()
}
fn default_gex_url() -> String {
    "https://api.example.com/v1/gex".to_string()
}
fn default_quote_urls() -> Vec<String> {
    vec!["https://api.example.com/v1/quotes".to_string()]
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            context_url: default_context_url(),
            gex_url: default_gex_url(),
            quote_urls: default_quote_urls(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_metrics_port() -> u16 {
    9090
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it eagerly
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path_str,
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed range
    ///
    /// Runs once at startup. A failure here must abort the process before
    /// any component is constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let open = self.validation.open_time()?;
        let close = self.validation.close_time()?;
        if open >= close {
            return Err(invalid(
                "validation.market_open",
                &self.validation.market_open,
                "session open must precede close",
            ));
        }
        self.validation.timezone()?;

        if self.risk.max_volatility <= self.risk.caution_volatility {
            return Err(invalid(
                "risk.max_volatility",
                self.risk.max_volatility,
                "must exceed risk.caution_volatility",
            ));
        }
        if self.risk.caution_size_factor <= Decimal::ZERO
            || self.risk.caution_size_factor > Decimal::ONE
        {
            return Err(invalid(
                "risk.caution_size_factor",
                self.risk.caution_size_factor,
                "must be in (0, 1]",
            ));
        }
        if self.risk.max_open_positions == 0 {
            return Err(invalid(
                "risk.max_open_positions",
                self.risk.max_open_positions,
                "must be at least 1",
            ));
        }
        if self.risk.max_exposure <= Decimal::ZERO {
            return Err(invalid(
                "risk.max_exposure",
                self.risk.max_exposure,
                "must be positive",
            ));
        }

        if self.sizing.base_size <= Decimal::ZERO {
            return Err(invalid(
                "sizing.base_size",
                self.sizing.base_size,
                "must be positive",
            ));
        }
        if self.sizing.kelly_fraction <= Decimal::ZERO || self.sizing.kelly_fraction > Decimal::ONE
        {
            return Err(invalid(
                "sizing.kelly_fraction",
                self.sizing.kelly_fraction,
                "must be in (0, 1]",
            ));
        }
        if self.sizing.min_size < 0 {
            return Err(invalid(
                "sizing.min_size",
                self.sizing.min_size,
                "must be non-negative",
            ));
        }
        if self.sizing.max_size < self.sizing.min_size {
            return Err(invalid(
                "sizing.max_size",
                self.sizing.max_size,
                "must be at least sizing.min_size",
            ));
        }

        let hundred = dec!(100);
        if self.confidence.base_confidence < Decimal::ZERO
            || self.confidence.base_confidence > hundred
        {
            return Err(invalid(
                "confidence.base_confidence",
                self.confidence.base_confidence,
                "must be in [0, 100]",
            ));
        }
        if self.confidence.min_confidence < Decimal::ZERO
            || self.confidence.min_confidence > hundred
        {
            return Err(invalid(
                "confidence.min_confidence",
                self.confidence.min_confidence,
                "must be in [0, 100]",
            ));
        }
        for (field, value) in [
            (
                "confidence.max_context_adjustment",
                self.confidence.max_context_adjustment,
            ),
            (
                "confidence.max_positioning_adjustment",
                self.confidence.max_positioning_adjustment,
            ),
            (
                "confidence.max_gex_adjustment",
                self.confidence.max_gex_adjustment,
            ),
        ] {
            if value < Decimal::ZERO {
                return Err(invalid(field, value, "must be non-negative"));
            }
        }

        if self.cache.dedup_expiry_secs < self.cache.dedup_window_secs {
            return Err(invalid(
                "cache.dedup_expiry_secs",
                self.cache.dedup_expiry_secs,
                "must be at least cache.dedup_window_secs",
            ));
        }

        if self.gex.stale_threshold_hours <= 0 {
            return Err(invalid(
                "gex.stale_threshold_hours",
                self.gex.stale_threshold_hours,
                "must be positive",
            ));
        }
        if self.gex.stale_weight_reduction < Decimal::ZERO
            || self.gex.stale_weight_reduction > Decimal::ONE
        {
            return Err(invalid(
                "gex.stale_weight_reduction",
                self.gex.stale_weight_reduction,
                "must be in [0, 1]",
            ));
        }

        if self.exit.profit_target_pct <= Decimal::ZERO {
            return Err(invalid(
                "exit.profit_target_pct",
                self.exit.profit_target_pct,
                "must be positive",
            ));
        }
        if self.exit.stop_loss_pct <= Decimal::ZERO {
            return Err(invalid(
                "exit.stop_loss_pct",
                self.exit.stop_loss_pct,
                "must be positive",
            ));
        }
        if self.exit.max_hold_hours <= 0 {
            return Err(invalid(
                "exit.max_hold_hours",
                self.exit.max_hold_hours,
                "must be positive",
            ));
        }

        if self.fetch.max_attempts == 0 {
            return Err(invalid(
                "fetch.max_attempts",
                self.fetch.max_attempts,
                "must be at least 1",
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(invalid(
                "fetch.timeout_secs",
                self.fetch.timeout_secs,
                "must be at least 1",
            ));
        }

        if self.providers.quote_urls.is_empty() {
            return Err(invalid(
                "providers.quote_urls",
                "[]",
                "at least one quote endpoint is required",
            ));
        }

        Ok(())
    }
}
