//! Notification target descriptors as they appear in a rule's `actions` list.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Notification channel types. Unrecognized names deserialize to
/// [`ChannelType::Unknown`], which the factory refuses to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelType {
    Console,
    Webhook,
    Slack,
    Unknown(String),
}

impl ChannelType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "console" => ChannelType::Console,
            "webhook" => ChannelType::Webhook,
            "slack" => ChannelType::Slack,
            other => ChannelType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChannelType::Console => "console",
            ChannelType::Webhook => "webhook",
            ChannelType::Slack => "slack",
            ChannelType::Unknown(name) => name,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChannelType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChannelType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ChannelType::from_name(&name))
    }
}

/// One entry of a rule's `actions` list.
///
/// `config` is channel-specific and only interpreted by the factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(rename = "type")]
    pub channel: ChannelType,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl NotifierConfig {
    pub fn console() -> Self {
        Self {
            channel: ChannelType::Console,
            config: Map::new(),
        }
    }

    /// Read a string option from `config`.
    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}
