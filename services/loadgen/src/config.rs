use std::{fmt::Display, str::FromStr, time::Duration};

use traffic_model::{ConfigurationError, RampUp, ThinkTime};
use url::Url;

/// Relative paths the gateway scenario hits on the target host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub canary: String,
    pub fortune: String,
    pub beta: String,
    pub aggregate: String,
    /// Route prefix of the aggregating service behind the gateway.
    pub aggregate_prefix: String,
}

impl Endpoints {
    pub fn aggregate_path(&self) -> String {
        format!(
            "{}{}",
            self.aggregate_prefix.trim_end_matches('/'),
            self.aggregate
        )
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            canary: "/".to_string(),
            fortune: "/fortunes".to_string(),
            beta: "/beta-insights".to_string(),
            aggregate: "/aggregate".to_string(),
            aggregate_prefix: "/service-b".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target_host: Url,
    pub endpoints: Endpoints,
    pub users: usize,
    pub run_time: Option<Duration>,
    pub request_timeout: Duration,
    pub think_time: ThinkTime,
    pub ramp_up: RampUp,
    pub beta_gate: f64,
    pub exclude_tags: Vec<String>,
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("TARGET_HOST").unwrap_or_else(|| "http://localhost:8080".to_string());
        let target_host = Url::parse(&host)
            .map_err(|e| ConfigurationError::invalid_setting("TARGET_HOST", &host, e))?;
        if !matches!(target_host.scheme(), "http" | "https") {
            return Err(ConfigurationError::invalid_setting(
                "TARGET_HOST",
                &host,
                "scheme must be http or https",
            ));
        }

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            canary: path_or(&lookup, "CANARY_ENDPOINT", &defaults.canary),
            fortune: path_or(&lookup, "FORTUNE_ENDPOINT", &defaults.fortune),
            beta: path_or(&lookup, "BETA_ENDPOINT", &defaults.beta),
            aggregate: path_or(&lookup, "AGGREGATE_ENDPOINT", &defaults.aggregate),
            aggregate_prefix: path_or(&lookup, "AGGREGATE_PREFIX", &defaults.aggregate_prefix),
        };

        let users: usize = parse_or(&lookup, "LOADGEN_USERS", 10)?;
        if users == 0 {
            return Err(ConfigurationError::invalid_setting(
                "LOADGEN_USERS",
                "0",
                "at least one virtual user is required",
            ));
        }

        let run_time = parse_opt::<u64, _>(&lookup, "LOADGEN_RUN_TIME_SECS")?.map(Duration::from_secs);
        let request_timeout =
            Duration::from_millis(parse_or(&lookup, "LOADGEN_REQUEST_TIMEOUT_MS", 5000)?);
        if request_timeout.is_zero() {
            return Err(ConfigurationError::invalid_setting(
                "LOADGEN_REQUEST_TIMEOUT_MS",
                "0",
                "every request needs a timeout",
            ));
        }

        let think_time = ThinkTime::between(
            Duration::from_millis(parse_or(&lookup, "LOADGEN_THINK_MIN_MS", 200)?),
            Duration::from_millis(parse_or(&lookup, "LOADGEN_THINK_MAX_MS", 1000)?),
        )?;
        let ramp_up = RampUp::over(Duration::from_millis(parse_or(
            &lookup,
            "LOADGEN_RAMP_UP_MS",
            1000,
        )?));

        let beta_gate: f64 = parse_or(&lookup, "BETA_GATE_PROBABILITY", 0.3)?;
        if !(0.0..=1.0).contains(&beta_gate) {
            return Err(ConfigurationError::invalid_setting(
                "BETA_GATE_PROBABILITY",
                beta_gate.to_string(),
                "must be between 0 and 1",
            ));
        }

        let exclude_tags = lookup("LOADGEN_EXCLUDE_TAGS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let seed = parse_opt(&lookup, "LOADGEN_SEED")?;

        Ok(Self {
            target_host,
            endpoints,
            users,
            run_time,
            request_timeout,
            think_time,
            ramp_up,
            beta_gate,
            exclude_tags,
            seed,
        })
    }
}

fn path_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    if raw.starts_with('/') {
        raw
    } else {
        format!("/{}", raw)
    }
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigurationError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigurationError::invalid_setting(key, &raw, e)),
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigurationError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_gateway_scenario() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.target_host.as_str(), "http://localhost:8080/");
        assert_eq!(config.endpoints, Endpoints::default());
        assert_eq!(config.endpoints.aggregate_path(), "/service-b/aggregate");
        assert_eq!(config.users, 10);
        assert_eq!(config.run_time, None);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.think_time, ThinkTime::default());
        assert_eq!(config.ramp_up.window(), Duration::from_secs(1));
        assert_eq!(config.beta_gate, 0.3);
        assert!(config.exclude_tags.is_empty());
        assert_eq!(config.seed, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("TARGET_HOST", "http://gateway.canary:80"),
            ("FORTUNE_ENDPOINT", "luck"),
            ("LOADGEN_USERS", "25"),
            ("LOADGEN_RUN_TIME_SECS", "60"),
            ("LOADGEN_THINK_MIN_MS", "10"),
            ("LOADGEN_THINK_MAX_MS", "20"),
            ("LOADGEN_EXCLUDE_TAGS", "beta, ,internal"),
            ("LOADGEN_SEED", "1234"),
        ]))
        .unwrap();

        assert_eq!(config.target_host.host_str(), Some("gateway.canary"));
        assert_eq!(config.endpoints.fortune, "/luck");
        assert_eq!(config.users, 25);
        assert_eq!(config.run_time, Some(Duration::from_secs(60)));
        assert_eq!(config.think_time.upper_bound(), Duration::from_millis(20));
        assert_eq!(config.exclude_tags, vec!["beta", "internal"]);
        assert_eq!(config.seed, Some(1234));
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let cases: &[(&str, &str)] = &[
            ("TARGET_HOST", "not a url"),
            ("TARGET_HOST", "ftp://files.local"),
            ("LOADGEN_USERS", "many"),
            ("LOADGEN_USERS", "0"),
            ("LOADGEN_REQUEST_TIMEOUT_MS", "0"),
            ("BETA_GATE_PROBABILITY", "1.2"),
        ];
        for &(key, value) in cases {
            let err = Config::from_lookup(lookup_from(&[(key, value)])).unwrap_err();
            assert!(
                matches!(&err, ConfigurationError::InvalidSetting { key: k, .. } if k == key),
                "{}={} gave {:?}",
                key,
                value,
                err
            );
        }

        let err = Config::from_lookup(lookup_from(&[
            ("LOADGEN_THINK_MIN_MS", "500"),
            ("LOADGEN_THINK_MAX_MS", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidThinkTime { .. }));
    }
}
