//! 20-byte account address

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0; 20]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Shortened form for terminal output, e.g. `0x1234ab…cdef`
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..8], &full[full.len() - 4..])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address {0:?}: expected 0x followed by 40 hex digits")]
pub struct AddressParseError(pub String);

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressParseError(s.to_string()))?;
        if digits.len() != 40 {
            return Err(AddressParseError(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let text = "0xa0b86a33e6441e54b9c8c604dc395d6af2dc0ae8";
        let addr: Address = text.parse().unwrap();
        assert_eq!(addr.to_string(), text);
        assert_eq!(addr.short(), "0xa0b86a…0ae8");
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_mixed_case_accepted() {
        let addr: Address = "0xA0b86a33E6441e54B9c8c604Dc395d6Af2dc0Ae8".parse().unwrap();
        assert_eq!(addr.0[0], 0xa0);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("a0b86a33e6441e54b9c8c604dc395d6af2dc0ae8".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz b86a33e6441e54b9c8c604dc395d6af2dc0ae8".parse::<Address>().is_err());
    }

    #[test]
    fn test_zero() {
        let addr: Address = "0x0000000000000000000000000000000000000000".parse().unwrap();
        assert!(addr.is_zero());
    }
}
