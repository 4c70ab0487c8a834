use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Defaults mirror the numeric constants named throughout the component
// design so a config-less RouterConfig::default() already satisfies the
// quantified invariants.
pub const DEFAULT_STEP_BUDGET: u32 = 12;
pub const DEFAULT_MAX_ROUTING_ATTEMPTS: u8 = 3;
pub const DEFAULT_TURN_DEADLINE_MS: u64 = 60_000;
pub const DEFAULT_CRM_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CRM_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_GENERATOR_TIMEOUT_MS: u64 = 30_000;

/// Top-level config (`lead-router.toml` + `LEAD_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub crm: CrmConfig,
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    pub base_url: String,
    pub api_token: String,
    pub location_id: String,
    pub calendar_id: String,
    pub assigned_user_id: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_generator_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_path")]
    pub store_path: String,
    /// Optional time-to-live; `None` means checkpoints are kept indefinitely.
    pub ttl_secs: Option<u64>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            store_path: default_checkpoint_path(),
            ttl_secs: None,
        }
    }
}

/// Authentication mode for the inbound CRM webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    /// HMAC-SHA256 over the raw request body (GitHub-style X-Hub-Signature-256).
    HmacSha256,
    /// Static bearer token in the Authorization header.
    BearerToken,
    /// No authentication — use only for internal/trusted networks.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_auth_mode")]
    pub auth_mode: WebhookAuthMode,
    pub secret: Option<String>,
    /// Outbound channel for replies — `"whatsapp"` or `"sms"`. Left as a
    /// string here since the concrete `Channel` enum lives in `lead-crm`,
    /// which depends on this crate rather than the reverse.
    #[serde(default = "default_webhook_channel")]
    pub channel: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            auth_mode: default_webhook_auth_mode(),
            secret: None,
            channel: default_webhook_channel(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,
    #[serde(default = "default_max_routing_attempts")]
    pub max_routing_attempts: u8,
    #[serde(default = "default_turn_deadline_ms")]
    pub turn_deadline_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            step_budget: default_step_budget(),
            max_routing_attempts: default_max_routing_attempts(),
            turn_deadline_ms: default_turn_deadline_ms(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            crm: CrmConfig {
                base_url: "https://services.leadconnectorhq.com".to_string(),
                api_token: String::new(),
                location_id: String::new(),
                calendar_id: String::new(),
                assigned_user_id: String::new(),
                connect_timeout_ms: default_connect_timeout_ms(),
                request_timeout_ms: default_request_timeout_ms(),
            },
            generator: GeneratorConfig {
                base_url: String::new(),
                api_key: String::new(),
                model: String::new(),
                request_timeout_ms: default_generator_timeout_ms(),
            },
            checkpoint: CheckpointConfig::default(),
            webhook: WebhookConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CRM_CONNECT_TIMEOUT_MS
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_CRM_REQUEST_TIMEOUT_MS
}
fn default_generator_timeout_ms() -> u64 {
    DEFAULT_GENERATOR_TIMEOUT_MS
}
fn default_step_budget() -> u32 {
    DEFAULT_STEP_BUDGET
}
fn default_max_routing_attempts() -> u8 {
    DEFAULT_MAX_ROUTING_ATTEMPTS
}
fn default_turn_deadline_ms() -> u64 {
    DEFAULT_TURN_DEADLINE_MS
}
fn default_webhook_auth_mode() -> WebhookAuthMode {
    WebhookAuthMode::None
}
fn default_webhook_channel() -> String {
    "whatsapp".to_string()
}
fn default_checkpoint_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.lead-router/checkpoints.db", home)
}
fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.lead-router/lead-router.toml", home)
}

impl RouterConfig {
    /// Load config from a TOML file with `LEAD_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RouterConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("LEAD_").split("_"))
            .extract()
            .map_err(|e| crate::error::RouterError::ConfigError(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_spec_bounds() {
        let cfg = RouterConfig::default();
        assert_eq!(cfg.runtime.step_budget, 12);
        assert_eq!(cfg.runtime.max_routing_attempts, 3);
        assert_eq!(cfg.runtime.turn_deadline_ms, 60_000);
    }
}
