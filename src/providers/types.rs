use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Spotify,
    Youtube,
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderTag::Spotify => write!(f, "spotify"),
            ProviderTag::Youtube => write!(f, "youtube"),
        }
    }
}

impl FromStr for ProviderTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spotify" => Ok(ProviderTag::Spotify),
            "youtube" => Ok(ProviderTag::Youtube),
            _ => Err(format!(
                "Invalid provider: '{}'. Valid: spotify, youtube",
                s
            )),
        }
    }
}

impl ProviderTag {
    pub fn other(&self) -> ProviderTag {
        match self {
            ProviderTag::Spotify => ProviderTag::Youtube,
            ProviderTag::Youtube => ProviderTag::Spotify,
        }
    }
}
