//! Runtime configuration via `gpuscalar.toml`
//!
//! Selects the process-wide default device and builds the default memory
//! resource stack. Factories never read the configuration directly: it only
//! decides what `default_device()`, `default_stream()` and
//! `current_resource()` return after [`ScalarConfig::install`].

use std::path::Path;
use std::sync::Arc;

use gpuscalar_core::{Error, Result};
use gpuscalar_memory::{
    set_defaults, DeviceRef, HostDevice, HostMemoryResource,
    LimitingResourceAdaptor, MemoryResourceRef, StatisticsResourceAdaptor,
    DEFAULT_HOST_ALIGNMENT,
};
use serde::{Deserialize, Serialize};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "gpuscalar.toml";

/// Runtime configuration loaded from `gpuscalar.toml`.
///
/// # Example
///
/// ```toml
/// # Device backend: "host" (default) or "cuda"
/// device = "host"
/// alignment = 256
/// # memory_limit = 1073741824
/// track_statistics = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarConfig {
    /// Device backend: `"host"` or `"cuda"`.
    #[serde(default = "default_device_str")]
    pub device: String,
    /// Alignment in bytes of host-emulated allocations.
    #[serde(default = "default_alignment")]
    pub alignment: usize,
    /// Cap on outstanding bytes from the default resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<usize>,
    /// Count allocations flowing through the default resource.
    #[serde(default)]
    pub track_statistics: bool,
}

fn default_device_str() -> String {
    "host".to_string()
}

fn default_alignment() -> usize {
    DEFAULT_HOST_ALIGNMENT
}

impl Default for ScalarConfig {
    fn default() -> Self {
        Self {
            device: default_device_str(),
            alignment: default_alignment(),
            memory_limit: None,
            track_statistics: false,
        }
    }
}

/// Defaults built by [`ScalarConfig::install`]
pub struct InstalledDefaults {
    /// The new default device
    pub device: DeviceRef,
    /// The new default resource (outermost adaptor)
    pub resource: MemoryResourceRef,
    /// Statistics adaptor, when `track_statistics` is set
    pub statistics: Option<Arc<StatisticsResourceAdaptor>>,
}

impl ScalarConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# gpuscalar runtime configuration
#
# Device backend: "host" (default) or "cuda"
#   "host" = host heap stands in for device memory
#   "cuda" = CUDA device 0 (requires the "cuda" feature)
device = "host"

# Alignment in bytes of host-emulated allocations (power of two)
alignment = 256

# Cap on bytes the default memory resource may hand out at once.
# memory_limit = 1073741824

# Count allocations and bytes flowing through the default resource
track_statistics = false
"#
    }

    /// Validate field values.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unknown device, an alignment that is not
    /// a power of two, or a zero memory limit.
    pub fn validate(&self) -> Result<()> {
        match self.device.as_str() {
            "host" | "cuda" => {}
            other => {
                return Err(Error::config(format!(
                    "Invalid device '{}'. Expected \"host\" or \"cuda\".",
                    other
                )))
            }
        }
        if !self.alignment.is_power_of_two() {
            return Err(Error::config(format!(
                "alignment must be a power of two, got {}",
                self.alignment
            )));
        }
        if self.memory_limit == Some(0) {
            return Err(Error::config("memory_limit must be positive"));
        }
        Ok(())
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ScalarConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Build the configured device and resource stack without installing it.
    pub fn build(&self) -> Result<InstalledDefaults> {
        self.validate()?;
        let (device, base) = self.build_backend()?;

        let mut resource = base;
        if let Some(limit) = self.memory_limit {
            resource = Arc::new(LimitingResourceAdaptor::new(resource, limit)) as MemoryResourceRef;
        }
        let statistics = if self.track_statistics {
            let stats = Arc::new(StatisticsResourceAdaptor::new(resource));
            resource = Arc::clone(&stats) as MemoryResourceRef;
            Some(stats)
        } else {
            None
        };

        Ok(InstalledDefaults {
            device,
            resource,
            statistics,
        })
    }

    /// Build the stack and install it as the process-wide defaults.
    pub fn install(&self) -> Result<InstalledDefaults> {
        let built = self.build()?;
        set_defaults(Arc::clone(&built.device), Arc::clone(&built.resource));
        tracing::info!(
            target: "gpuscalar::scalar",
            device = built.device.name(),
            resource = built.resource.name(),
            "Installed configured defaults"
        );
        Ok(built)
    }

    fn build_backend(&self) -> Result<(DeviceRef, MemoryResourceRef)> {
        match self.device.as_str() {
            "cuda" => Self::build_cuda(),
            _ => {
                let device: DeviceRef = Arc::new(HostDevice::new());
                let resource: MemoryResourceRef =
                    Arc::new(HostMemoryResource::with_alignment(self.alignment)?);
                Ok((device, resource))
            }
        }
    }

    #[cfg(feature = "cuda")]
    fn build_cuda() -> Result<(DeviceRef, MemoryResourceRef)> {
        use gpuscalar_memory::cuda::{CudaAsyncMemoryResource, CudaDevice};
        let device = CudaDevice::try_new()?;
        let resource: MemoryResourceRef = Arc::new(CudaAsyncMemoryResource::new(&device));
        let device: DeviceRef = Arc::new(device);
        Ok((device, resource))
    }

    #[cfg(not(feature = "cuda"))]
    fn build_cuda() -> Result<(DeviceRef, MemoryResourceRef)> {
        Err(Error::config(
            "device = \"cuda\" requires the \"cuda\" feature",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuscalar_core::MemoryKind;
    use tempfile::TempDir;

    #[test]
    fn test_default_toml_parses_to_default() {
        let config = ScalarConfig::from_toml_str(ScalarConfig::default_toml()).unwrap();
        assert_eq!(config, ScalarConfig::default());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ScalarConfig::from_toml_str("").unwrap();
        assert_eq!(config.device, "host");
        assert_eq!(config.alignment, 256);
        assert_eq!(config.memory_limit, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ScalarConfig::from_toml_str("device = \"tpu\"").unwrap_err();
        assert!(err.to_string().contains("Invalid device"));
        assert!(ScalarConfig::from_toml_str("alignment = 100").is_err());
        assert!(ScalarConfig::from_toml_str("memory_limit = 0").is_err());
        assert!(ScalarConfig::from_toml_str("device = ").is_err());
    }

    #[test]
    fn test_write_default_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        ScalarConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        let config = ScalarConfig::from_file(&path).unwrap();
        assert_eq!(config, ScalarConfig::default());

        // Existing files are left alone
        std::fs::write(&path, "track_statistics = true\n").unwrap();
        ScalarConfig::write_default_if_missing(&path).unwrap();
        assert!(ScalarConfig::from_file(&path).unwrap().track_statistics);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = ScalarConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.is_logic_error());
    }

    #[test]
    fn test_build_stacks_adaptors() {
        let config = ScalarConfig {
            memory_limit: Some(1024),
            track_statistics: true,
            ..ScalarConfig::default()
        };
        let built = config.build().unwrap();
        assert_eq!(built.device.memory_kind(), MemoryKind::Host);
        assert_eq!(built.resource.name(), "statistics");
        assert!(built.statistics.is_some());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_requires_feature() {
        let config = ScalarConfig {
            device: "cuda".to_string(),
            ..ScalarConfig::default()
        };
        assert!(config.build().is_err());
    }
}
