use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::analysis::aggregator::DEFAULT_MIN_SUPPORT;
use crate::cache::DEFAULT_TTL_HOURS;

const DEFAULT_DELEGATE_TIMEOUT_SECS: u64 = 120;

/// Ten years. Keeps `chrono::Duration::hours` well inside its range.
const MAX_TTL_HOURS: i64 = 24 * 365 * 10;

/// Values people leave in `.env` templates instead of a real key.
const PLACEHOLDER_KEYS: &[&str] = &["changeme", "placeholder", "none", "null", "xxx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    File,
    Redis,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(CacheBackend::File),
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => bail!("unknown cache backend '{other}' (expected file, redis or memory)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    RuleBased,
    Delegate,
}

impl FromStr for ExtractionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rule_based" | "rules" => Ok(ExtractionStrategy::RuleBased),
            "delegate" | "llm" => Ok(ExtractionStrategy::Delegate),
            other => bail!("unknown extraction mode '{other}' (expected rule_based or delegate)"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup aborts if a value is present but invalid.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub cache_backend: CacheBackend,
    pub cache_dir: PathBuf,
    pub redis_url: Option<String>,
    pub cache_ttl_hours: i64,
    pub extraction: ExtractionStrategy,
    pub anthropic_api_key: Option<String>,
    pub delegate_timeout_secs: u64,
    pub delegate_fallback: bool,
    pub min_term_support: usize,
    pub vocabulary_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let anthropic_api_key =
            optional(&lookup, "ANTHROPIC_API_KEY").filter(|k| !is_placeholder_key(k));

        let extraction = match optional(&lookup, "EXTRACTION_MODE") {
            Some(raw) => raw
                .parse::<ExtractionStrategy>()
                .context("EXTRACTION_MODE is invalid")?,
            None if anthropic_api_key.is_some() => ExtractionStrategy::Delegate,
            None => ExtractionStrategy::RuleBased,
        };
        if extraction == ExtractionStrategy::Delegate && anthropic_api_key.is_none() {
            bail!("EXTRACTION_MODE=delegate requires ANTHROPIC_API_KEY to be set");
        }

        let cache_backend: CacheBackend = parse_or(&lookup, "CACHE_BACKEND", CacheBackend::File)?;
        let redis_url = optional(&lookup, "REDIS_URL");
        if cache_backend == CacheBackend::Redis && redis_url.is_none() {
            bail!("Required environment variable 'REDIS_URL' is not set (CACHE_BACKEND=redis)");
        }

        let cache_ttl_hours: i64 = parse_or(&lookup, "CACHE_TTL_HOURS", DEFAULT_TTL_HOURS)?;
        if cache_ttl_hours <= 0 {
            bail!("CACHE_TTL_HOURS must be positive");
        }
        if cache_ttl_hours > MAX_TTL_HOURS {
            bail!("CACHE_TTL_HOURS must be at most {MAX_TTL_HOURS}");
        }

        let min_term_support: usize = parse_or(&lookup, "MIN_TERM_SUPPORT", DEFAULT_MIN_SUPPORT)?;
        if min_term_support == 0 {
            bail!("MIN_TERM_SUPPORT must be at least 1");
        }

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: optional(&lookup, "RUST_LOG").unwrap_or_else(|| "info".to_string()),
            cache_backend,
            cache_dir: optional(&lookup, "CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cache")),
            redis_url,
            cache_ttl_hours,
            extraction,
            anthropic_api_key,
            delegate_timeout_secs: parse_or(
                &lookup,
                "DELEGATE_TIMEOUT_SECS",
                DEFAULT_DELEGATE_TIMEOUT_SECS,
            )?,
            delegate_fallback: match optional(&lookup, "DELEGATE_FALLBACK") {
                Some(raw) => parse_bool(&raw).context("DELEGATE_FALLBACK must be true or false")?,
                None => true,
            },
            min_term_support,
            vocabulary_path: optional(&lookup, "VOCABULARY_PATH").map(PathBuf::from),
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("{key} has invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("'{other}' is not a boolean"),
    }
}

fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    key.is_empty()
        || key.starts_with("your")
        || key.contains("api_key_here")
        || PLACEHOLDER_KEYS.contains(&key.as_str())
}
