use crate::recipients::normalize_phone_to_e164;
use serde::Deserialize;
use std::time::Duration;

/// Table names used by the aggregation queries.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryTables {
    pub monitoring: String,
    pub area_directory: String,
    pub leader_phones: String,
    pub holidays: String,
    pub economic_groups: String,
    pub clients: String,
    pub retail_chains: String,
}

impl Default for QueryTables {
    fn default() -> Self {
        Self {
            monitoring: "monitoramento_promotor".to_string(),
            area_directory: "dim_area_merchan".to_string(),
            leader_phones: "dim_telefone_merchan_lideranca".to_string(),
            holidays: "dim_feriado_merchan".to_string(),
            economic_groups: "dim_grupo_economico".to_string(),
            clients: "dim_cliente".to_string(),
            retail_chains: "dim_rede_cliente".to_string(),
        }
    }
}

/// Business rules applied inside the aggregation queries.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub tables: QueryTables,
    /// Check-in types that count a visit as completed.
    pub valid_checkins: Vec<String>,
    pub important_groups: Vec<String>,
    pub important_chains: Vec<String>,
    pub exclude_holidays: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            tables: QueryTables::default(),
            valid_checkins: vec!["Manual".to_string(), "Manual e GPS".to_string()],
            important_groups: Vec::new(),
            important_chains: Vec::new(),
            exclude_holidays: true,
        }
    }
}

/// Test-mode phone override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientConfig {
    pub use_test_phone: bool,
    pub test_phone_e164: Option<String>,
}

/// Messaging gateway endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
}

/// Pacing and safety switches for the dispatch batch.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    pub preview_mode: bool,
    pub between_recipients_secs: u64,
    pub same_recipient_secs: u64,
    /// 0 disables the warm-up step.
    pub warmup_secs: u64,
    pub kickoff_phone: Option<String>,
    pub preview_chars: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            preview_mode: true,
            between_recipients_secs: 7,
            same_recipient_secs: 5,
            warmup_secs: 0,
            kickoff_phone: None,
            preview_chars: 400,
        }
    }
}

impl DispatchConfig {
    pub fn between_recipients(&self) -> Duration {
        Duration::from_secs(self.between_recipients_secs)
    }

    pub fn same_recipient(&self) -> Duration {
        Duration::from_secs(self.same_recipient_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub area_order: Vec<String>,
    pub queries: QueryConfig,
    pub recipients: RecipientConfig,
    pub gateway: GatewayConfig,
    pub dispatch: DispatchConfig,
}

pub const DEFAULT_AREA_ORDER: [&str; 4] = ["Centro Norte", "Filial", "Grandes Redes", "Trad"];

/// Splits a comma-separated list, dropping blank entries.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the boolean spellings operators actually type into `.env` files.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "sim" | "on" => Some(true),
        "0" | "false" | "no" | "nao" | "não" | "off" => Some(false),
        _ => None,
    }
}

/// True when the normalized phone keeps at least one digit.
pub fn has_phone_digits(raw: &str) -> bool {
    normalize_phone_to_e164(raw)
        .chars()
        .any(|c| c.is_ascii_digit())
}

/// First 20 characters of a URL, for logs.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

fn env_bool(names: &[&str], default: bool) -> anyhow::Result<bool> {
    for name in names {
        if let Ok(raw) = std::env::var(name) {
            return parse_bool(&raw).ok_or_else(|| {
                anyhow::anyhow!("{} must be a boolean (true/false), got '{}'", name, raw)
            });
        }
    }
    Ok(default)
}

fn env_secs(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", name)),
        Err(_) => Ok(default),
    }
}

fn env_list(name: &str, default: Vec<String>) -> Vec<String> {
    match std::env::var(name) {
        Ok(raw) => parse_list(&raw),
        Err(_) => default,
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_or(name: &str, default: String) -> String {
    env_opt(name).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let tables = QueryTables::default();
        let tables = QueryTables {
            monitoring: env_or("TABLE_MONITORAMENTO", tables.monitoring),
            area_directory: env_or("TABLE_AREA_MERCHAN", tables.area_directory),
            leader_phones: env_or("TABLE_TELEFONE_LIDERANCA", tables.leader_phones),
            holidays: env_or("TABLE_FERIADO_MERCHAN", tables.holidays),
            economic_groups: env_or("TABLE_GRUPO_ECONOMICO", tables.economic_groups),
            clients: env_or("TABLE_CLIENTE", tables.clients),
            retail_chains: env_or("TABLE_REDE_CLIENTE", tables.retail_chains),
        };

        let query_defaults = QueryConfig::default();
        let dispatch_defaults = DispatchConfig::default();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            area_order: env_list(
                "AREAS_ORDEM_PADRAO",
                DEFAULT_AREA_ORDER.iter().map(|s| s.to_string()).collect(),
            ),
            queries: QueryConfig {
                tables,
                valid_checkins: env_list("CHECKIN_VALIDOS", query_defaults.valid_checkins),
                important_groups: env_list("GRUPOS_ECONOMICOS_IMPORTANTES", Vec::new()),
                important_chains: env_list("REDES_IMPORTANTES", Vec::new()),
                exclude_holidays: env_bool(&["EXCLUDE_HOLIDAYS"], true)?,
            },
            recipients: RecipientConfig {
                use_test_phone: env_bool(&["USE_TEST_PHONE"], true)?,
                test_phone_e164: env_opt("TEST_PHONE_E164"),
            },
            gateway: GatewayConfig {
                base_url: env_opt("WHATSAPP_GATEWAY_URL")
                    .map(|url| -> anyhow::Result<String> {
                        if !url.starts_with("http://") && !url.starts_with("https://") {
                            anyhow::bail!(
                                "WHATSAPP_GATEWAY_URL must start with http:// or https://"
                            );
                        }
                        Ok(url.trim_end_matches('/').to_string())
                    })
                    .transpose()?,
                token: env_opt("WHATSAPP_GATEWAY_TOKEN"),
            },
            dispatch: DispatchConfig {
                preview_mode: env_bool(&["MODO_TESTE", "PREVIEW_MODE"], true)?,
                between_recipients_secs: env_secs(
                    "WA_INTERVALO_ENTRE_MENSAGENS",
                    dispatch_defaults.between_recipients_secs,
                )?,
                same_recipient_secs: env_secs(
                    "WA_INTERVALO_MESMO_NUMERO",
                    dispatch_defaults.same_recipient_secs,
                )?,
                warmup_secs: env_secs("WA_WARMUP_SEGUNDOS", dispatch_defaults.warmup_secs)?,
                kickoff_phone: env_opt("WA_KICKOFF_PHONE"),
                preview_chars: env_secs(
                    "WA_PREVIEW_CHARS",
                    dispatch_defaults.preview_chars as u64,
                )? as usize,
            },
        };

        if config.recipients.use_test_phone {
            match config.recipients.test_phone_e164.as_deref() {
                None => {
                    anyhow::bail!("TEST_PHONE_E164 is required while USE_TEST_PHONE is enabled")
                }
                Some(phone) if !has_phone_digits(phone) => anyhow::bail!(
                    "TEST_PHONE_E164 '{}' has no digits; refusing to run with USE_TEST_PHONE enabled",
                    phone
                ),
                Some(_) => {}
            }
        }
        if config.queries.valid_checkins.is_empty() {
            anyhow::bail!("CHECKIN_VALIDOS must list at least one check-in type");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", url_prefix(&config.database_url));
        if let Some(ref url) = config.gateway.base_url {
            tracing::debug!("WhatsApp gateway URL: {}", url);
        }
        if config.recipients.use_test_phone {
            tracing::warn!("USE_TEST_PHONE active: every message goes to the test phone");
        }
        tracing::debug!("Area order: {:?}", config.area_order);

        Ok(config)
    }
}
