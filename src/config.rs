use crate::domain::product::ProductDefinition;
use crate::error::{CoordinatorError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Which storefront the receipts come from. Selects the receipt validator.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    GooglePlay,
    AppStore,
    #[default]
    Fake,
}

/// Whether `start()` initializes the storefront itself or waits for
/// an explicit `initialize_with_products` call.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitializationPolicy {
    Eager,
    #[default]
    Deferred,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub plugin_name: String,
    pub store: StoreKind,
    pub initialization: InitializationPolicy,
    pub products: Vec<ProductDefinition>,
    pub purchase_timeout_ms: Option<u64>,
    /// Completion ids a `subscribe_completions` receiver may fall behind before it lags.
    pub completion_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            plugin_name: "UnityPurchase".to_string(),
            store: StoreKind::default(),
            initialization: InitializationPolicy::default(),
            products: Vec::new(),
            purchase_timeout_ms: None,
            completion_buffer: 64,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.plugin_name.is_empty() {
            return Err(CoordinatorError::ConfigError(
                "plugin_name must not be empty".to_string(),
            ));
        }
        if self.completion_buffer == 0 {
            return Err(CoordinatorError::ConfigError(
                "completion_buffer must be positive".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for def in &self.products {
            if def.id.is_empty() {
                return Err(CoordinatorError::ConfigError(
                    "product id must not be empty".to_string(),
                ));
            }
            if !seen.insert(def.id.as_str()) {
                return Err(CoordinatorError::ConfigError(format!(
                    "duplicate product id: {}",
                    def.id
                )));
            }
        }
        Ok(())
    }

    pub fn purchase_timeout(&self) -> Option<Duration> {
        self.purchase_timeout_ms.map(Duration::from_millis)
    }
}
