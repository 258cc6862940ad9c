// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provisioner Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) shared by the
// gateway and worker processes:
// - gateway bind address
// - secret derivation key (must be identical on every replica)
// - job store backend and retention
// - worker pool sizing, execution budget and crash recovery
// - EasyRSA issuer and profile template settings
// - status feed source
// - observability settings

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::issuer::TransportProto;
use crate::domain::secret::SecretKey;

pub const API_VERSION: &str = "ovpn-provisioner/v1";
pub const KIND: &str = "ProvisionerConfig";

/// Minimum accepted length of the derivation key, in bytes.
pub const MIN_SECRET_KEY_LEN: usize = 16;

/// Top-level Kubernetes-style provisioner configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// API version (must be "ovpn-provisioner/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ProvisionerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ProvisionerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerSpec {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub secret: SecretConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub issuer: IssuerConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_gateway_port(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Derivation key, or `env:VAR` to read it from the environment.
    #[serde(default = "default_secret_key")]
    pub key: String,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            key: default_secret_key(),
        }
    }
}

impl std::fmt::Debug for SecretConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.key.starts_with("env:") { self.key.as_str() } else { "<redacted>" };
        f.debug_struct("SecretConfig").field("key", &shown).finish()
    }
}

impl SecretConfig {
    pub fn resolve(&self) -> anyhow::Result<SecretKey> {
        let raw = resolve_env_value(&self.key).context("spec.secret.key")?;
        if raw.len() < MIN_SECRET_KEY_LEN {
            anyhow::bail!(
                "spec.secret.key must be at least {} bytes, got {}",
                MIN_SECRET_KEY_LEN,
                raw.len()
            );
        }
        Ok(SecretKey::new(raw.into_bytes())?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Memory,
    Postgres,
}

/// How the gateway keeps two jobs for one identity from being in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionGuard {
    /// Check-then-submit. Two simultaneous requests may both be accepted.
    Advisory,
    /// Atomic create-if-absent in the job store.
    Exclusive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackendKind,

    /// Connection string, or `env:VAR`. Required for `postgres`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Retention of terminal jobs.
    #[serde(default = "default_job_ttl", with = "humantime_serde")]
    pub job_ttl: Duration,

    #[serde(default = "default_submission_guard")]
    pub submission_guard: SubmissionGuard,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            max_connections: default_max_connections(),
            job_ttl: default_job_ttl(),
            submission_guard: default_submission_guard(),
        }
    }
}

impl StoreConfig {
    pub fn resolved_url(&self) -> anyhow::Result<Option<String>> {
        self.url
            .as_deref()
            .map(|url| resolve_env_value(url).context("spec.store.url"))
            .transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Jobs executed in parallel by one worker process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Wall-clock budget for one job.
    #[serde(default = "default_worker_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Idle delay between empty dequeue attempts.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// `Started` jobs older than this are assumed orphaned by a dead worker.
    #[serde(default = "default_stale_after", with = "humantime_serde")]
    pub stale_after: Duration,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_purge_interval", with = "humantime_serde")]
    pub purge_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout: default_worker_timeout(),
            poll_interval: default_poll_interval(),
            stale_after: default_stale_after(),
            max_attempts: default_max_attempts(),
            purge_interval: default_purge_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    #[serde(default = "default_easyrsa_path")]
    pub easyrsa_path: PathBuf,

    #[serde(default = "default_pki_dir")]
    pub pki_dir: PathBuf,

    /// CA certificate embedded in profiles. Defaults to `<pki_dir>/ca.crt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Certificate lifetime passed as `--days`.
    #[serde(default = "default_cert_days")]
    pub days: u32,

    /// Directory holding one `<identity>.ovpn` per provisioned client.
    #[serde(default = "default_client_dir")]
    pub client_dir: PathBuf,

    /// Profile header file. The built-in template is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_file: Option<PathBuf>,

    #[serde(default = "default_remote_host")]
    pub remote_host: String,

    #[serde(default = "default_remote_port")]
    pub remote_port: u16,

    #[serde(default = "default_proto")]
    pub proto: TransportProto,

    /// Static key appended as a `<tls-crypt>` section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_crypt_key: Option<PathBuf>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            easyrsa_path: default_easyrsa_path(),
            pki_dir: default_pki_dir(),
            ca_cert: None,
            days: default_cert_days(),
            client_dir: default_client_dir(),
            common_file: None,
            remote_host: default_remote_host(),
            remote_port: default_remote_port(),
            proto: default_proto(),
            tls_crypt_key: None,
        }
    }
}

impl IssuerConfig {
    pub fn ca_cert_path(&self) -> PathBuf {
        self.ca_cert
            .clone()
            .unwrap_or_else(|| self.pki_dir.join("ca.crt"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum StatusConfig {
    /// Snapshot file rewritten by the VPN server (`status` directive).
    File { path: PathBuf },
    /// OpenVPN management interface.
    Management {
        host: String,
        port: u16,
        #[serde(default = "default_management_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
}

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig::File {
            path: PathBuf::from("/var/log/openvpn/openvpn-status.log"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Prometheus exporter port; disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_secret_key() -> String {
    "env:OVPN_SECRET_KEY".to_string()
}

fn default_store_backend() -> StoreBackendKind {
    StoreBackendKind::Memory
}

fn default_max_connections() -> u32 {
    5
}

fn default_job_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_submission_guard() -> SubmissionGuard {
    SubmissionGuard::Exclusive
}

fn default_concurrency() -> usize {
    2
}

fn default_worker_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_stale_after() -> Duration {
    Duration::from_secs(600)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_purge_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_easyrsa_path() -> PathBuf {
    PathBuf::from("/etc/openvpn/easy-rsa/easyrsa")
}

fn default_pki_dir() -> PathBuf {
    PathBuf::from("/etc/openvpn/easy-rsa/pki")
}

fn default_cert_days() -> u32 {
    3650
}

fn default_client_dir() -> PathBuf {
    PathBuf::from("/etc/openvpn/client")
}

fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}

fn default_remote_port() -> u16 {
    1194
}

fn default_proto() -> TransportProto {
    TransportProto::Tcp
}

fn default_management_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "ovpn-provisioner".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: ProvisionerSpec::default(),
        }
    }
}

/// Resolve `env:VAR` indirection; other values are returned unchanged.
pub fn resolve_env_value(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var).with_context(|| format!("environment variable {var} is not set")),
        None => Ok(value.to_string()),
    }
}

impl ProvisionerConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. OVPN_CONFIG_PATH environment variable
    /// 2. ./ovpn-provisioner.yaml (working directory)
    /// 3. ~/.ovpn-provisioner/config.yaml (user home)
    /// 4. /etc/ovpn-provisioner/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("OVPN_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./ovpn-provisioner.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".ovpn-provisioner").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/ovpn-provisioner/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path: fail if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .with_context(|| format!("Failed to load config at {:?}", path))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(&config_path)
                .with_context(|| format!("Failed to load config at {:?}", config_path))?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("OVPN_SECRET_KEY") {
            if !val.is_empty() {
                tracing::info!("Environment override: OVPN_SECRET_KEY");
                self.spec.secret.key = "env:OVPN_SECRET_KEY".to_string();
            }
        }

        if let Ok(val) = std::env::var("OVPN_DATABASE_URL") {
            tracing::info!("Environment override: OVPN_DATABASE_URL (backend=postgres)");
            self.spec.store.backend = StoreBackendKind::Postgres;
            self.spec.store.url = Some(val);
        }

        if let Ok(val) = std::env::var("OVPN_CLIENT_DIR") {
            tracing::info!("Environment override: OVPN_CLIENT_DIR={}", val);
            self.spec.issuer.client_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("OVPN_REMOTE_HOST") {
            tracing::info!("Environment override: OVPN_REMOTE_HOST={}", val);
            self.spec.issuer.remote_host = val;
        }

        if let Ok(val) = std::env::var("OVPN_STATUS_FILE") {
            tracing::info!("Environment override: OVPN_STATUS_FILE={}", val);
            self.spec.status = StatusConfig::File { path: PathBuf::from(val) };
        }

        if let Ok(val) = std::env::var("OVPN_WORKER_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: OVPN_WORKER_TIMEOUT_SECS={}", secs);
                    self.spec.worker.timeout = Duration::from_secs(secs);
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for OVPN_WORKER_TIMEOUT_SECS: '{}'. Expected seconds. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.secret.key.is_empty() {
            anyhow::bail!("spec.secret.key cannot be empty");
        }
        self.spec.secret.resolve()?;

        let worker = &self.spec.worker;
        if worker.concurrency == 0 {
            anyhow::bail!("spec.worker.concurrency must be at least 1");
        }
        if worker.timeout.is_zero() {
            anyhow::bail!("spec.worker.timeout must be greater than zero");
        }
        if worker.max_attempts == 0 {
            anyhow::bail!("spec.worker.max_attempts must be at least 1");
        }
        if worker.stale_after <= worker.timeout {
            anyhow::bail!(
                "spec.worker.stale_after ({:?}) must exceed spec.worker.timeout ({:?})",
                worker.stale_after,
                worker.timeout
            );
        }

        if self.spec.store.backend == StoreBackendKind::Postgres {
            match self.spec.store.resolved_url()? {
                Some(url) if !url.is_empty() => {}
                _ => anyhow::bail!("spec.store.url is required for the postgres backend"),
            }
        }

        if self.spec.issuer.remote_host.is_empty() {
            anyhow::bail!("spec.issuer.remote_host cannot be empty");
        }
        if self.spec.issuer.days == 0 {
            anyhow::bail!("spec.issuer.days must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProvisionerConfig {
        let mut config = ProvisionerConfig::default();
        config.spec.secret.key = "0123456789abcdef0123".to_string();
        config
    }

    #[test]
    fn test_default_manifest() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.gateway.port, 5000);
        assert_eq!(config.spec.worker.timeout, Duration::from_secs(300));
        assert_eq!(config.spec.issuer.days, 3650);
        assert_eq!(config.spec.store.submission_guard, SubmissionGuard::Exclusive);
        assert_eq!(config.spec.issuer.ca_cert_path(), PathBuf::from("/etc/openvpn/easy-rsa/pki/ca.crt"));
    }

    #[test]
    fn test_yaml_parsing_with_durations() {
        let yaml = r#"
apiVersion: ovpn-provisioner/v1
kind: ProvisionerConfig
metadata:
  name: edge-gateway
spec:
  gateway:
    port: 8080
  secret:
    key: "a-sufficiently-long-key"
  store:
    backend: postgres
    url: postgres://ovpn@db/ovpn
    job_ttl: 2h
    submission_guard: advisory
  worker:
    concurrency: 4
    timeout: 90s
    stale_after: 10m
  issuer:
    remote_host: vpn.example.net
    proto: udp
    common_file: /etc/openvpn/server/client-common.txt
  status:
    source: management
    host: 127.0.0.1
    port: 7505
"#;
        let config = ProvisionerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metadata.name, "edge-gateway");
        assert_eq!(config.spec.gateway.port, 8080);
        assert_eq!(config.spec.gateway.host, "0.0.0.0");
        assert_eq!(config.spec.store.backend, StoreBackendKind::Postgres);
        assert_eq!(config.spec.store.job_ttl, Duration::from_secs(7200));
        assert_eq!(config.spec.store.submission_guard, SubmissionGuard::Advisory);
        assert_eq!(config.spec.worker.concurrency, 4);
        assert_eq!(config.spec.worker.timeout, Duration::from_secs(90));
        assert_eq!(config.spec.worker.max_attempts, 3);
        assert_eq!(config.spec.issuer.proto, TransportProto::Udp);
        assert_eq!(
            config.spec.status,
            StatusConfig::Management {
                host: "127.0.0.1".to_string(),
                port: 7505,
                timeout: Duration::from_secs(5),
            }
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = valid();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = ProvisionerConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.secret.key, config.spec.secret.key);
        assert_eq!(parsed.spec.worker.stale_after, config.spec.worker.stale_after);
        assert_eq!(parsed.spec.status, config.spec.status);
    }

    #[test]
    fn test_validation() {
        let mut config = valid();
        assert!(config.validate().is_ok());

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.kind = "WrongKind".to_string();
        assert!(config.validate().is_err());
        config.kind = KIND.to_string();

        config.spec.secret.key = "short".to_string();
        assert!(config.validate().is_err());
        config.spec.secret.key = "0123456789abcdef0123".to_string();

        config.spec.worker.concurrency = 0;
        assert!(config.validate().is_err());
        config.spec.worker.concurrency = 1;

        config.spec.worker.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.spec.worker.timeout = Duration::from_secs(300);

        config.spec.store.backend = StoreBackendKind::Postgres;
        assert!(config.validate().is_err());
        config.spec.store.url = Some("postgres://localhost/ovpn".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_indirection() {
        std::env::set_var("OVPN_TEST_INDIRECT_KEY", "indirect-key-of-enough-length");
        let secret = SecretConfig {
            key: "env:OVPN_TEST_INDIRECT_KEY".to_string(),
        };
        assert_eq!(secret.resolve().unwrap().len(), "indirect-key-of-enough-length".len());

        let missing = SecretConfig {
            key: "env:OVPN_TEST_DEFINITELY_UNSET".to_string(),
        };
        assert!(missing.resolve().is_err());
        assert_eq!(resolve_env_value("literal").unwrap(), "literal");
    }

    #[test]
    fn test_debug_redacts_literal_key() {
        let config = valid();
        assert!(!format!("{:?}", config.spec.secret).contains("0123456789abcdef0123"));
    }
}
