//! Configuration management for the hot-swap engine
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::types::{Address, ChainId};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub cross_chain: CrossChainConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub instance_id: String,
    pub health_check_interval_secs: u64,
    #[serde(default)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Identities bound into the authorization policies
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
    pub owner: String,
    pub governance: String,
    pub oracle: String,
    /// Identity the DAO registry admits; the governance engine acts as it
    pub dao_executor: String,
    /// Signer allowed to request quantum-safe signature checks
    #[serde(default)]
    pub quantum_verifier: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GovernanceConfig {
    pub quorum: usize,
    /// Empty means any caller may vote
    #[serde(default)]
    pub voters: Vec<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            quorum: crate::governance::DEFAULT_QUORUM,
            voters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationConfig {
    /// Hex Keccak-256 digests of proofs the local verifier accepts
    #[serde(default)]
    pub accepted_proof_digests: Vec<String>,
    /// Empty falls back to the built-in post-quantum set
    #[serde(default)]
    pub approved_algorithms: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file receiving every audit record
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrossChainConfig {
    #[serde(default)]
    pub require_registered_chain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub name: String,
}

impl Settings {
    /// Load settings from the file named by `HOTSWAP_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("HOTSWAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("owner", &self.authority.owner),
            ("governance", &self.authority.governance),
            ("oracle", &self.authority.oracle),
            ("dao_executor", &self.authority.dao_executor),
        ] {
            let address = parse_address(value)
                .with_context(|| format!("authority.{} is not an address", field))?;
            if address == Address::ZERO {
                anyhow::bail!("authority.{} must not be the zero address", field);
            }
        }
        if let Some(verifier) = &self.authority.quantum_verifier {
            parse_address(verifier).context("authority.quantum_verifier is not an address")?;
        }
        for voter in &self.governance.voters {
            parse_address(voter).with_context(|| format!("Invalid voter address {}", voter))?;
        }

        if self.governance.quorum == 0 {
            anyhow::bail!("governance.quorum must be at least 1");
        }
        if self.service.health_check_interval_secs == 0 {
            anyhow::bail!("service.health_check_interval_secs must be at least 1");
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                anyhow::bail!("Chain {} is configured twice", chain.chain_id);
            }
        }

        if self.validation.accepted_proof_digests.is_empty() {
            tracing::warn!(
                "No accepted proof digests configured - every gated swap will be rejected"
            );
        }

        Ok(())
    }

    pub fn owner(&self) -> Result<Address> {
        parse_address(&self.authority.owner)
    }

    pub fn governance_address(&self) -> Result<Address> {
        parse_address(&self.authority.governance)
    }

    pub fn oracle(&self) -> Result<Address> {
        parse_address(&self.authority.oracle)
    }

    pub fn dao_executor(&self) -> Result<Address> {
        parse_address(&self.authority.dao_executor)
    }

    /// Falls back to the oracle when no dedicated signer is configured
    pub fn quantum_verifier(&self) -> Result<Address> {
        match &self.authority.quantum_verifier {
            Some(verifier) => parse_address(verifier),
            None => self.oracle(),
        }
    }

    pub fn voters(&self) -> Result<Vec<Address>> {
        self.governance.voters.iter().map(|v| parse_address(v)).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("Invalid address: {:?}", value))
}

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid pattern");
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

/// Minimal valid configuration shared by tests
#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[service]
instance_id = "hotswap-test"
health_check_interval_secs = 30

[api]
host = "127.0.0.1"
port = 8080

[metrics]
enabled = false
port = 9090

[authority]
owner = "0x0101010101010101010101010101010101010101"
governance = "0x0202020202020202020202020202020202020202"
oracle = "0x0303030303030303030303030303030303030303"
dao_executor = "0xdadadadadadadadadadadadadadadadadadadada"

[[chains]]
chain_id = 1
name = "Ethereum"

[[chains]]
chain_id = 137
name = "Polygon"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_parse_with_defaults() {
        let settings = Settings::parse(SAMPLE_CONFIG).unwrap();

        assert_eq!(settings.governance.quorum, 2);
        assert!(!settings.service.log_json);
        assert!(!settings.cross_chain.require_registered_chain);
        assert_eq!(settings.owner().unwrap(), Address::repeat_byte(0x01));
        assert_eq!(settings.quantum_verifier().unwrap(), Address::repeat_byte(0x03));
        assert_eq!(settings.get_chain_by_id(137).map(|c| c.name.as_str()), Some("Polygon"));
    }

    #[test]
    fn test_zero_owner_rejected() {
        let config = SAMPLE_CONFIG.replace(
            "0x0101010101010101010101010101010101010101",
            "0x0000000000000000000000000000000000000000",
        );
        assert!(Settings::parse(&config).is_err());
    }

    #[test]
    fn test_duplicate_chain_rejected() {
        let config = SAMPLE_CONFIG.replace("chain_id = 137", "chain_id = 1");
        let err = Settings::parse(&config).unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_zero_quorum_rejected() {
        let config = format!("{}\n[governance]\nquorum = 0\n", SAMPLE_CONFIG);
        assert!(Settings::parse(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.service.instance_id, "hotswap-test");
        assert_eq!(settings.chains.len(), 2);
    }
}
