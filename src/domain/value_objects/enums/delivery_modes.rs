use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    OptIn,
    Global,
    Passive,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::OptIn => "optin",
            DeliveryMode::Global => "global",
            DeliveryMode::Passive => "passive",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "optin" => Some(DeliveryMode::OptIn),
            "global" => Some(DeliveryMode::Global),
            "passive" => Some(DeliveryMode::Passive),
            _ => None,
        }
    }
}

impl Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
