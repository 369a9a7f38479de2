use crate::utilities::get_environment_variable_with_default;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_PLATFORM: &str = "default";

/// Per-platform knobs for the record flattener.
///
/// `field_mappings` and `excluded_fields` are keyed by sanitized column path
/// (`address_zip`, not `Address.Zip`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub max_depth: usize,
    pub max_array_index: Option<usize>,
    pub max_column_name_length: usize,
    pub field_mappings: BTreeMap<String, String>,
    pub excluded_fields: BTreeSet<String>,
    pub flatten_arrays: bool,
    pub preserve_nulls: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_array_index: None,
            max_column_name_length: 128,
            field_mappings: BTreeMap::new(),
            excluded_fields: BTreeSet::new(),
            flatten_arrays: true,
            preserve_nulls: false,
        }
    }
}

impl TransformConfig {
    // Shortened names are `<prefix>_<hash4>_<suffix>`, so anything below this
    // cannot fit a hash and at least one character on either side.
    pub const MIN_COLUMN_NAME_LENGTH: usize = 16;

    pub fn validate(&self) -> Result<()> {
        if self.max_column_name_length < Self::MIN_COLUMN_NAME_LENGTH {
            return Err(anyhow!(
                "max_column_name_length must be at least {}, got {}",
                Self::MIN_COLUMN_NAME_LENGTH,
                self.max_column_name_length
            ));
        }

        if self.max_depth == 0 {
            return Err(anyhow!("max_depth must be at least 1"));
        }

        Ok(())
    }

    fn with_mappings(mappings: &[(&str, &str)]) -> Self {
        Self {
            field_mappings: mappings
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            ..Default::default()
        }
    }
}

/// Platform identifier → transform config lookup table.
#[derive(Debug, Clone)]
pub struct TransformConfigs {
    configs: HashMap<String, TransformConfig>,
}

impl Default for TransformConfigs {
    fn default() -> Self {
        let mut configs = HashMap::new();

        configs.insert(DEFAULT_PLATFORM.to_string(), TransformConfig::default());
        configs.insert(
            "hubspot".to_string(),
            TransformConfig {
                max_depth: 6,
                ..TransformConfig::with_mappings(&[
                    ("properties_createdate", "created_at"),
                    ("properties_lastmodifieddate", "updated_at"),
                ])
            },
        );
        configs.insert(
            "salesforce".to_string(),
            TransformConfig {
                excluded_fields: ["attributes".to_string()].into(),
                ..TransformConfig::with_mappings(&[
                    ("createddate", "created_at"),
                    ("lastmodifieddate", "updated_at"),
                ])
            },
        );
        configs.insert(
            "stripe".to_string(),
            TransformConfig {
                max_array_index: Some(50),
                ..TransformConfig::with_mappings(&[("created", "created_at")])
            },
        );
        configs.insert(
            "pipedrive".to_string(),
            TransformConfig::with_mappings(&[
                ("add_time", "created_at"),
                ("update_time", "updated_at"),
            ]),
        );
        configs.insert(
            "activecampaign".to_string(),
            TransformConfig {
                excluded_fields: ["links".to_string()].into(),
                ..TransformConfig::with_mappings(&[("cdate", "created_at"), ("udate", "updated_at")])
            },
        );
        configs.insert(
            "keap".to_string(),
            TransformConfig::with_mappings(&[
                ("date_created", "created_at"),
                ("last_updated", "updated_at"),
            ]),
        );

        Self { configs }
    }
}

impl TransformConfigs {
    /// Returns the config for `platform`, falling back to the default entry.
    pub fn get(&self, platform: &str) -> &TransformConfig {
        self.resolve(platform).1
    }

    /// Like [`TransformConfigs::get`], also returning the table key that matched.
    pub fn resolve(&self, platform: &str) -> (&str, &TransformConfig) {
        let platform = platform.trim().to_lowercase();

        match self.configs.get_key_value(&platform) {
            Some((key, config)) => (key.as_str(), config),
            None => {
                debug!("no transform config for platform {platform}, using default");
                (DEFAULT_PLATFORM, &self.configs[DEFAULT_PLATFORM])
            }
        }
    }

    pub fn insert(&mut self, platform: &str, config: TransformConfig) -> Result<()> {
        config
            .validate()
            .with_context(|| format!("invalid transform config for {platform}"))?;
        self.configs.insert(platform.trim().to_lowercase(), config);
        Ok(())
    }

    /// Built-in table with overrides from a JSON object of
    /// `{"<platform>": {<TransformConfig fields>}}` applied on top.
    pub fn from_overrides_json(json: &str) -> Result<Self> {
        let overrides: HashMap<String, TransformConfig> =
            serde_json::from_str(json).context("could not parse transform config overrides")?;

        let mut configs = Self::default();
        for (platform, config) in overrides {
            configs.insert(&platform, config)?;
        }

        Ok(configs)
    }

    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("could not read {}", path.display()))?;
                let configs = Self::from_overrides_json(&json)?;
                info!("Loaded transform config overrides from {}", path.display());
                Ok(configs)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadIdentityConfig {
    pub audience: Option<String>,
    pub service_account_token_path: String,
    pub sts_endpoint: String,
}

impl Default for WorkloadIdentityConfig {
    fn default() -> Self {
        Self {
            audience: None,
            service_account_token_path: "/var/run/secrets/kubernetes.io/serviceaccount/token"
                .to_string(),
            sts_endpoint: "https://sts.googleapis.com/v1/token".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bucket: String,
    pub max_body_bytes: usize,
    pub transform_config_path: Option<String>,
    pub workload_identity: WorkloadIdentityConfig,
}

/// The metrics listener binds to `port + 1`, so the top port is reserved for it.
fn parse_port(value: &str) -> Result<u16> {
    let port = value
        .trim()
        .parse::<u16>()
        .with_context(|| format!("PORT must be a port number, got {value:?}"))?;

    if port == u16::MAX {
        return Err(anyhow!("PORT {port} leaves no room for the metrics listener"));
    }

    Ok(port)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let port = parse_port(&get_environment_variable_with_default(
            "PORT",
            "8000".to_string(),
        ))?;

        let bucket = std::env::var("PARQUET_STORAGE_BUCKET")
            .map_err(|_| anyhow!("PARQUET_STORAGE_BUCKET must be set"))?;

        let max_body_bytes =
            get_environment_variable_with_default("MAX_BODY_BYTES", (32 * 1024 * 1024).to_string())
                .parse::<usize>()
                .context("MAX_BODY_BYTES must be a positive integer")?;

        let defaults = WorkloadIdentityConfig::default();
        let workload_identity = WorkloadIdentityConfig {
            audience: std::env::var("GOOGLE_WORKLOAD_AUDIENCE").ok(),
            service_account_token_path: get_environment_variable_with_default(
                "GOOGLE_SERVICE_ACCOUNT_TOKEN_PATH",
                defaults.service_account_token_path,
            ),
            sts_endpoint: get_environment_variable_with_default(
                "GOOGLE_STS_ENDPOINT",
                defaults.sts_endpoint,
            ),
        };

        Ok(Self {
            port,
            bucket,
            max_body_bytes,
            transform_config_path: std::env::var("TRANSFORM_CONFIG_PATH").ok(),
            workload_identity,
        })
    }
}
