//! Market (exchange board) codes and the feed index-code table
//!
//! The upstream feed identifies indices by a two-digit market code
//! (`mc` field); the table below maps those codes to index names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange board a feed connection is opened against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    /// Ho Chi Minh Stock Exchange
    Hose,
    /// Hanoi Stock Exchange
    Hnx,
    /// Unlisted Public Company Market
    Upcom,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Hose => "HOSE",
            Market::Hnx => "HNX",
            Market::Upcom => "UPCOM",
        }
    }

    /// Parse a market code, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HOSE" => Some(Market::Hose),
            "HNX" => Some(Market::Hnx),
            "UPCOM" => Some(Market::Upcom),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a feed market code (`mc`) to (index name, exchange board).
///
/// Unknown codes are passed through by callers with the raw code as the
/// index id, so new indices degrade gracefully instead of being dropped.
pub fn index_code(mc: &str) -> Option<(&'static str, Market)> {
    Some(match mc {
        "10" => ("VNINDEX", Market::Hose),
        "11" => ("VN30", Market::Hose),
        "28" => ("VN100", Market::Hose),
        "29" => ("VNALL", Market::Hose),
        "02" => ("HNX-INDEX", Market::Hnx),
        "32" => ("HNX30", Market::Hnx),
        "33" => ("HNXLCAP", Market::Hnx),
        "34" => ("HNXMID", Market::Hnx),
        "35" => ("HNXSMCAP", Market::Hnx),
        "36" => ("HNXIND", Market::Hnx),
        "37" => ("HNXFIN", Market::Hnx),
        "38" => ("HNXUT", Market::Hnx),
        "39" => ("HNXMAN", Market::Hnx),
        "40" => ("HNXREAL", Market::Hnx),
        "41" => ("HNXTECH", Market::Hnx),
        "42" => ("HNXENER", Market::Hnx),
        "43" => ("HNXCON", Market::Hnx),
        "03" => ("UPCOM-INDEX", Market::Upcom),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_parse() {
        assert_eq!(Market::parse("hose"), Some(Market::Hose));
        assert_eq!(Market::parse("HNX"), Some(Market::Hnx));
        assert_eq!(Market::parse("Upcom"), Some(Market::Upcom));
        assert_eq!(Market::parse("NYSE"), None);
    }

    #[test]
    fn test_market_serialization() {
        let json = serde_json::to_string(&Market::Hose).unwrap();
        assert_eq!(json, "\"HOSE\"");
    }

    #[test]
    fn test_index_code_lookup() {
        assert_eq!(index_code("10"), Some(("VNINDEX", Market::Hose)));
        assert_eq!(index_code("02"), Some(("HNX-INDEX", Market::Hnx)));
        assert_eq!(index_code("03"), Some(("UPCOM-INDEX", Market::Upcom)));
        assert_eq!(index_code("99"), None);
    }
}
