//! Configuration resolution for propply-compliance
//!
//! Secrets and endpoints resolve with ENV → TOML priority; everything else
//! comes from the TOML file (or its defaults). The resolved values are wired
//! into the long-lived services held by [`AppState`].

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use propply_common::config::{env_value, AnalysisConfig, SodaConfig, TomlConfig};
use propply_common::{Error, Result};
use tracing::{info, warn};

use crate::aggregator::{Aggregator, AggregatorSettings, ScoringPolicy};
use crate::analysis::{AnalysisClient, AnalysisService, DisabledAnalysis};
use crate::registry::DatasetRegistry;
use crate::resolver::Resolver;
use crate::soda::{HttpTransport, RetryPolicy, SodaClient, SodaCredentials};
use crate::{AppState, RequestSettings};

pub const ENV_SODA_APP_TOKEN: &str = "PROPPLY_SODA_APP_TOKEN";
pub const ENV_SODA_KEY_ID: &str = "PROPPLY_SODA_KEY_ID";
pub const ENV_SODA_KEY_SECRET: &str = "PROPPLY_SODA_KEY_SECRET";
pub const ENV_ANALYSIS_URL: &str = "PROPPLY_ANALYSIS_URL";

/// Resolve one setting from environment, then TOML
///
/// Blank values count as absent. Warns when both sources carry a value.
pub fn resolve_setting(label: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env = env_value(env_var);
    let toml = toml_value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if env.is_some() && toml.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(value) = env {
        info!("{} loaded from environment variable {}", label, env_var);
        return Some(value);
    }
    if let Some(value) = toml {
        info!("{} loaded from TOML config", label);
        return Some(value);
    }
    None
}

/// SODA credentials from ENV/TOML
///
/// Basic auth needs both key id and secret; half a pair is ignored.
pub fn resolve_soda_credentials(soda: &SodaConfig) -> SodaCredentials {
    let app_token = resolve_setting("SODA app token", ENV_SODA_APP_TOKEN, soda.app_token.as_deref());
    let key_id = resolve_setting("SODA key id", ENV_SODA_KEY_ID, soda.api_key_id.as_deref());
    let key_secret = resolve_setting("SODA key secret", ENV_SODA_KEY_SECRET, soda.api_key_secret.as_deref());

    let api_key = match (key_id, key_secret) {
        (Some(id), Some(secret)) => Some((id, secret)),
        (None, None) => None,
        _ => {
            warn!("SODA key id and secret must both be set; ignoring the partial key");
            None
        }
    };

    let credentials = SodaCredentials { app_token, api_key };
    if credentials.is_anonymous() {
        info!("No SODA credentials configured, using anonymous access");
    }
    credentials
}

pub fn resolve_analysis_url(analysis: &AnalysisConfig) -> Option<String> {
    resolve_setting("Analysis URL", ENV_ANALYSIS_URL, analysis.url.as_deref())
}

/// Analysis bridge for the resolved URL, or the disabled stand-in
pub fn build_analysis_service(analysis: &AnalysisConfig) -> Result<Arc<dyn AnalysisService>> {
    match resolve_analysis_url(analysis) {
        Some(url) => {
            let client = AnalysisClient::new(
                url,
                Duration::from_secs(analysis.timeout_secs),
                Duration::from_secs(analysis.expected_secs),
            )
            .map_err(|e| Error::Config(format!("Analysis HTTP client: {}", e)))?;
            Ok(Arc::new(client))
        }
        None => {
            warn!("No analysis URL configured, reports will not include analysis");
            Ok(Arc::new(DisabledAnalysis))
        }
    }
}

/// SODA client over the HTTP transport
pub fn build_soda_client(soda: &SodaConfig) -> Result<SodaClient> {
    let requests_per_second = NonZeroU32::new(soda.requests_per_second)
        .ok_or_else(|| Error::Config("soda.requests_per_second must be greater than 0".to_string()))?;

    let transport = HttpTransport::new(
        soda.base_url.clone(),
        resolve_soda_credentials(soda),
        Duration::from_secs(soda.timeout_secs),
        requests_per_second,
    )
    .map_err(|e| Error::Config(format!("SODA HTTP client: {}", e)))?;

    Ok(SodaClient::new(
        Arc::new(transport),
        RetryPolicy::with_backoff(Duration::from_millis(soda.retry_backoff_ms)),
    ))
}

/// Build the service graph from configuration
pub fn build_state(config: &TomlConfig) -> Result<AppState> {
    let mut registry = DatasetRegistry::nyc().map_err(|e| Error::Config(e.to_string()))?;
    if let Some(page_size) = config.soda.page_size {
        registry = registry.with_page_size(page_size);
    }
    let registry = Arc::new(registry);

    let client = build_soda_client(&config.soda)?;
    let resolver = Resolver::new(client.clone(), Arc::clone(&registry));
    let aggregator = Aggregator::with_settings(
        client,
        Arc::clone(&registry),
        AggregatorSettings {
            max_records_per_domain: config.aggregation.max_records_per_domain,
            fallback_on_empty: config.aggregation.fallback_on_empty,
            scoring: ScoringPolicy::default(),
        },
    );

    Ok(AppState::new(
        registry,
        Arc::new(resolver),
        Arc::new(aggregator),
        build_analysis_service(&config.analysis)?,
        RequestSettings {
            sample_size: config.aggregation.sample_size,
            include_fdny: config.aggregation.include_fdny,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [ENV_SODA_APP_TOKEN, ENV_SODA_KEY_ID, ENV_SODA_KEY_SECRET, ENV_ANALYSIS_URL] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_env_wins_over_toml() {
        clear_env();
        std::env::set_var(ENV_SODA_APP_TOKEN, "env-token");
        let soda = SodaConfig {
            app_token: Some("toml-token".to_string()),
            ..Default::default()
        };

        let credentials = resolve_soda_credentials(&soda);
        assert_eq!(credentials.app_token.as_deref(), Some("env-token"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_toml_used_when_env_blank() {
        clear_env();
        std::env::set_var(ENV_SODA_APP_TOKEN, "   ");
        let soda = SodaConfig {
            app_token: Some("toml-token".to_string()),
            ..Default::default()
        };

        let credentials = resolve_soda_credentials(&soda);
        assert_eq!(credentials.app_token.as_deref(), Some("toml-token"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_partial_key_pair_ignored() {
        clear_env();
        let soda = SodaConfig {
            api_key_id: Some("id".to_string()),
            ..Default::default()
        };
        let credentials = resolve_soda_credentials(&soda);
        assert!(credentials.api_key.is_none());
        assert!(credentials.is_anonymous());

        std::env::set_var(ENV_SODA_KEY_SECRET, "secret");
        let credentials = resolve_soda_credentials(&soda);
        assert_eq!(
            credentials.api_key,
            Some(("id".to_string(), "secret".to_string()))
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_analysis_disabled_without_url() {
        clear_env();
        let service = build_analysis_service(&AnalysisConfig::default()).unwrap();
        assert!(!service.is_enabled());

        std::env::set_var(ENV_ANALYSIS_URL, "http://127.0.0.1:9/webhook");
        let service = build_analysis_service(&AnalysisConfig::default()).unwrap();
        assert!(service.is_enabled());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_build_state_from_defaults() {
        clear_env();
        let state = build_state(&TomlConfig::default()).unwrap();
        assert_eq!(state.registry.descriptors().count(), 7);
        assert_eq!(state.settings.sample_size, 10);
        assert!(state.settings.include_fdny);
    }
}
