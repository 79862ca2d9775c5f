use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What kind of holding a symbol prices.
///
/// The kind selects which providers are eligible in the fallback chain and
/// how the symbol is interpreted (exchange-qualified ticker, fund scheme code,
/// metal futures symbol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    /// Exchange-traded equity or ETF, e.g. `RELIANCE.NS`
    #[default]
    Equity,
    /// Mutual fund keyed by scheme code, e.g. `119551`
    MutualFund,
    /// Precious metal, e.g. `GC=F`
    Metal,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Equity => "EQUITY",
            AssetKind::MutualFund => "MUTUAL_FUND",
            AssetKind::Metal => "METAL",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQUITY" | "STOCK" | "ETF" => Ok(AssetKind::Equity),
            "MUTUAL_FUND" | "MUTUALFUND" | "MF" => Ok(AssetKind::MutualFund),
            "METAL" | "COMMODITY" => Ok(AssetKind::Metal),
            other => Err(format!("Unknown asset kind: {}", other)),
        }
    }
}
