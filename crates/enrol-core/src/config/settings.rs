//! Parsing and defaults for `enrol-sync.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::ids::RoleId;
use crate::status::{AllowedStatuses, DEFAULT_STATUSES};
use crate::{Error, Result};

/// Conventional configuration file name
pub const CONFIG_FILE_NAME: &str = "enrol-sync.toml";

fn default_enabled() -> bool {
    true
}

fn default_statuses() -> String {
    DEFAULT_STATUSES.join(",")
}

fn default_roles() -> BTreeMap<String, RoleId> {
    BTreeMap::from([
        ("sds_student".to_string(), RoleId(5)),
        ("sds_teacher".to_string(), RoleId(4)),
        ("sds_convenor".to_string(), RoleId(3)),
    ])
}

/// `[sync]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSection {
    /// Global switch; a disabled sync is a no-op
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Allow-list used by instances that do not set their own
    #[serde(default = "default_statuses")]
    pub default_statuses: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_statuses: default_statuses(),
        }
    }
}

/// Parsed sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub sync: SyncSection,

    /// Connect role name to target role id
    #[serde(default = "default_roles")]
    pub roles: BTreeMap<String, RoleId>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync: SyncSection::default(),
            roles: default_roles(),
        }
    }
}

impl SyncConfig {
    /// Parse configuration from TOML content
    ///
    /// # Example
    ///
    /// ```
    /// use enrol_core::config::SyncConfig;
    ///
    /// let config = SyncConfig::parse(r#"
    /// [sync]
    /// enabled = false
    /// "#).unwrap();
    ///
    /// assert!(!config.sync.enabled);
    /// assert_eq!(config.roles.len(), 3);
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist, or a
    /// parse error if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self.roles.iter().find(|(name, _)| name.trim().is_empty()) {
            return Err(Error::InvalidConfig {
                message: format!("role mapping has an empty name: {:?}", name),
            });
        }
        Ok(())
    }

    /// Whether the sync runs at all
    pub fn is_enabled(&self) -> bool {
        self.sync.enabled
    }

    /// Allow-list for an instance, falling back to the configured default
    pub fn allowed_statuses(&self, instance_statuses: &str) -> AllowedStatuses {
        AllowedStatuses::parse(instance_statuses, &self.sync.default_statuses)
    }

    /// Target role for a Connect role name
    pub fn role_for(&self, role_name: &str) -> Option<RoleId> {
        self.roles.get(role_name.trim()).copied()
    }
}
