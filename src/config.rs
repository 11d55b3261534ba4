//! Runtime configuration.

use std::env;

/// Default application identifier, used to scope ledger namespaces.
pub const DEFAULT_APP_ID: &str = "com.example.iap";

/// User id stamped on orders synthesized for lost transactions.
pub const DEFAULT_UNKNOWN_USER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub app_id: String,
    pub unknown_user_id: String,
}

impl Config {
    /// Read `IAP_APP_ID` and `IAP_UNKNOWN_USER`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            app_id: env::var("IAP_APP_ID")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.app_id),
            unknown_user_id: env::var("IAP_UNKNOWN_USER")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.unknown_user_id),
        }
    }

    pub fn order_namespace(&self) -> String {
        format!("{}.orderItem", self.app_id)
    }

    pub fn transaction_namespace(&self) -> String {
        format!("{}.transactionItem", self.app_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            unknown_user_id: DEFAULT_UNKNOWN_USER.to_string(),
        }
    }
}
