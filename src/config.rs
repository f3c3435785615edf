use std::time::Duration;

use crate::assistant::client::OPENAI_BASE_URL;
use crate::error::{AnalystError, Result};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const ASSISTANT_ID_VAR: &str = "ASSISTANT_ID";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const POLL_INTERVAL_VAR: &str = "POLL_INTERVAL_MS";
pub const RUN_TIMEOUT_VAR: &str = "RUN_TIMEOUT_SECS";
pub const POLL_MAX_FAILURES_VAR: &str = "POLL_MAX_FAILURES";

/// Timing and failure budget for polling a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    /// Pause between two status reads while the run is queued or in progress.
    pub interval: Duration,
    /// Wall-clock limit for the whole polling loop.
    pub deadline: Duration,
    /// Consecutive failed status reads tolerated before giving up.
    pub max_consecutive_failures: u32,
    /// Pause after the first failed read; doubles with each further failure.
    pub retry_backoff: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(120),
            max_consecutive_failures: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub assistant_id: Option<String>,
    pub base_url: String,
    pub poll: PollSettings,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = non_empty(API_KEY_VAR).ok_or_else(|| {
            AnalystError::Config(format!("{} environment variable not set.", API_KEY_VAR))
        })?;

        let mut poll = PollSettings::default();
        if let Some(ms) = parse_var::<u64>(&non_empty, POLL_INTERVAL_VAR)? {
            poll.interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&non_empty, RUN_TIMEOUT_VAR)? {
            poll.deadline = Duration::from_secs(secs);
        }
        if let Some(failures) = parse_var::<u32>(&non_empty, POLL_MAX_FAILURES_VAR)? {
            poll.max_consecutive_failures = failures;
        }

        Ok(Self {
            api_key,
            assistant_id: non_empty(ASSISTANT_ID_VAR),
            base_url: non_empty(BASE_URL_VAR).unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            poll,
        })
    }

    /// The assistant identity, required by every flow that starts runs.
    pub fn require_assistant_id(&self) -> Result<&str> {
        self.assistant_id.as_deref().ok_or_else(|| {
            AnalystError::Config(format!(
                "{} environment variable not set. Run `create-assistant` first.",
                ASSISTANT_ID_VAR
            ))
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                AnalystError::Config(format!("Invalid value '{}' for {}: {}", raw, key, e))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "sk-test"),
            (ASSISTANT_ID_VAR, "asst_1"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert_eq!(config.poll, PollSettings::default());
        assert_eq!(config.require_assistant_id().unwrap(), "asst_1");
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = ServiceConfig::from_lookup(lookup(&[(ASSISTANT_ID_VAR, "asst_1")])).unwrap_err();
        assert!(matches!(err, AnalystError::Config(_)));
    }

    #[test]
    fn test_missing_assistant_id_reported_on_demand() {
        let config =
            ServiceConfig::from_lookup(lookup(&[(API_KEY_VAR, "sk-test"), (ASSISTANT_ID_VAR, " ")]))
                .unwrap();
        assert!(config.assistant_id.is_none());
        assert!(config.require_assistant_id().is_err());
    }

    #[test]
    fn test_poll_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "sk-test"),
            (POLL_INTERVAL_VAR, "250"),
            (RUN_TIMEOUT_VAR, "30"),
            (POLL_MAX_FAILURES_VAR, "5"),
        ]))
        .unwrap();

        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.poll.deadline, Duration::from_secs(30));
        assert_eq!(config.poll.max_consecutive_failures, 5);
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "sk-test"),
            (RUN_TIMEOUT_VAR, "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(RUN_TIMEOUT_VAR));
    }
}
