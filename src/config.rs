//! Bridge configuration.

use crate::error::{BridgeError, Result};
use crate::types::{EventFilter, KindTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default name of the native callback thread.
pub const DEFAULT_CALLBACK_THREAD_NAME: &str = "list-player-events";

/// Widest filter accepted; each kind costs one native attach call.
pub const MAX_FILTER_SPAN: u64 = 1024;

/// Bridge configuration.
///
/// ```json
/// {
///   "filter": { "first": 1024, "last": 1026 },
///   "kinds": { "finished": 1024, "advanced": 1025, "stopped": 1026 },
///   "callback_thread_name": "list-player-events"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Native kinds the bridge attaches to. Attach and detach both use
    /// exactly this range.
    pub filter: EventFilter,

    /// Native kind for each event variant.
    pub kinds: KindTable,

    /// Name given to the thread delivering native callbacks. Handed to the
    /// native event manager before attaching.
    pub callback_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let kinds = KindTable::default();
        Self {
            filter: EventFilter::new(kinds.finished, kinds.stopped),
            kinds,
            callback_thread_name: DEFAULT_CALLBACK_THREAD_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check everything [`EventBridge::attach`](crate::EventBridge::attach)
    /// relies on: the attachment settings plus the kind table.
    pub fn validate(&self) -> Result<()> {
        self.validate_attachment()?;

        for kind in self.kinds.kinds() {
            if !self.filter.contains(kind) {
                return Err(BridgeError::InvalidConfig(format!(
                    "{:?} is outside {:?}",
                    kind, self.filter
                )));
            }
        }

        let [finished, advanced, stopped] = self.kinds.kinds();
        if finished == advanced || finished == stopped || advanced == stopped {
            return Err(BridgeError::InvalidConfig(
                "event kinds must be distinct".to_string(),
            ));
        }

        Ok(())
    }

    /// Check the settings used to attach, independent of any translator:
    /// a non-empty filter no wider than [`MAX_FILTER_SPAN`] and a thread name.
    pub fn validate_attachment(&self) -> Result<()> {
        if self.filter.is_empty() {
            return Err(BridgeError::InvalidConfig(format!(
                "empty event filter {:?}",
                self.filter
            )));
        }

        if self.filter.len() > MAX_FILTER_SPAN {
            return Err(BridgeError::InvalidConfig(format!(
                "{:?} spans {} kinds, more than {}",
                self.filter,
                self.filter.len(),
                MAX_FILTER_SPAN
            )));
        }

        if self.callback_thread_name.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "callback thread name is empty".to_string(),
            ));
        }

        Ok(())
    }
}
