//! Conversion between textual addresses and puzzle hashes.
//!
//! Two input forms are accepted: a bech32m address carrying one of the known
//! network prefixes, or a raw `0x`-prefixed 32 byte hex puzzle hash.

use crate::bytes::Bytes32;
use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

pub const MAINNET_PREFIX: &str = "xch";
pub const TESTNET_PREFIX: &str = "txch";

pub const KNOWN_PREFIXES: &[&str] = &[MAINNET_PREFIX, TESTNET_PREFIX];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("malformed hex puzzle hash: {0:?}")]
    MalformedHex(String),
    #[error("malformed address {input:?}: {reason}")]
    MalformedAddress { input: String, reason: String },
}

impl AddressError {
    fn malformed(input: &str, reason: impl ToString) -> Self {
        AddressError::MalformedAddress {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn prefix(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_PREFIX,
            Network::Testnet => TESTNET_PREFIX,
        }
    }

    /// Display unit used in reports.
    pub fn unit(&self) -> &'static str {
        match self {
            Network::Mainnet => "XCH",
            Network::Testnet => "TXCH",
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            // the node names its test networks testnet10, testnet11...
            other if other.starts_with("testnet") => Ok(Network::Testnet),
            other => Err(anyhow::anyhow!("unknown network {:?}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Network::from_str(&name).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Decodes either accepted address form into its puzzle hash.
pub fn parse(input: &str) -> Result<Bytes32, AddressError> {
    let input = input.trim();
    if let Some(digits) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        return Bytes32::from_str(&format!("0x{}", digits))
            .map_err(|_| AddressError::MalformedHex(input.to_string()));
    }

    let (prefix, data, variant) =
        bech32::decode(input).map_err(|err| AddressError::malformed(input, err))?;
    if variant != Variant::Bech32m {
        return Err(AddressError::malformed(input, "not a bech32m checksum"));
    }
    if !KNOWN_PREFIXES.contains(&prefix.as_str()) {
        return Err(AddressError::malformed(
            input,
            format!("unknown prefix {:?}", prefix),
        ));
    }
    let bytes = Vec::<u8>::from_base32(&data).map_err(|err| AddressError::malformed(input, err))?;
    Bytes32::from_slice(&bytes).ok_or_else(|| {
        AddressError::malformed(input, format!("payload is {} bytes, expected 32", bytes.len()))
    })
}

/// Encodes a puzzle hash as a bech32m address with the given prefix.
pub fn format(hash: &Bytes32, prefix: &str) -> Result<String, AddressError> {
    bech32::encode(prefix, hash.as_bytes().to_base32(), Variant::Bech32m)
        .map_err(|err| AddressError::malformed(prefix, err))
}

#[cfg(test)]
mod tests {
    use crate::address::{format, parse, AddressError, Network, MAINNET_PREFIX, TESTNET_PREFIX};
    use crate::bytes::Bytes32;
    use std::str::FromStr;

    fn sequential_hash() -> Bytes32 {
        let mut bytes = [0u8; 32];
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = index as u8;
        }
        Bytes32::new(bytes)
    }

    #[test]
    fn known_vectors() {
        let hash = sequential_hash();
        assert_eq!(
            format(&hash, MAINNET_PREFIX).unwrap(),
            "xch1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnzs23v9ccrydpk8qarc0srg6dkm"
        );
        assert_eq!(
            format(&hash, TESTNET_PREFIX).unwrap(),
            "txch1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnzs23v9ccrydpk8qarc0sw0amhg"
        );
        assert_eq!(
            parse("xch14w46h2at4w46h2at4w46h2at4w46h2at4w46h2at4w46h2at4w4ss4hlxt").unwrap(),
            Bytes32::new([0xab; 32])
        );
    }

    #[test]
    fn round_trip() {
        let hashes = vec![Bytes32::default(), Bytes32::new([0xff; 32]), sequential_hash()];
        for hash in hashes {
            for prefix in [MAINNET_PREFIX, TESTNET_PREFIX] {
                let address = format(&hash, prefix).unwrap();
                assert_eq!(parse(&address).unwrap(), hash, "{}", address);
                assert_eq!(format(&parse(&address).unwrap(), prefix).unwrap(), address);
            }
        }
    }

    #[test]
    fn hex_form() {
        let hash = sequential_hash();
        assert_eq!(parse(&hash.to_hex()).unwrap(), hash);
        assert_eq!(parse(&hash.to_hex().to_uppercase().replacen("0X", "0x", 1)).unwrap(), hash);
        assert_eq!(parse(&hash.to_hex().to_uppercase()).unwrap(), hash);
        assert_eq!(parse(&hash.to_hex().replacen("0x", "0X", 1)).unwrap(), hash);
    }

    #[test]
    fn malformed_hex() {
        let inputs = vec![
            "0x1234".to_string(),
            "0X1234".to_string(),
            format!("0X{}", "g".repeat(64)),
            format!("0x{}", "g".repeat(64)),
            format!("0x{}", "0".repeat(65)),
        ];
        for input in inputs {
            assert!(
                matches!(parse(&input), Err(AddressError::MalformedHex(_))),
                "{}",
                input
            );
        }
    }

    #[test]
    fn malformed_address() {
        assert!(matches!(
            parse("xch1!!!"),
            Err(AddressError::MalformedAddress { .. })
        ));
        // flipped last checksum character
        assert!(matches!(
            parse("xch1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnzs23v9ccrydpk8qarc0srg6dkq"),
            Err(AddressError::MalformedAddress { .. })
        ));
        let foreign = format(&sequential_hash(), "bc").unwrap();
        assert!(matches!(
            parse(&foreign),
            Err(AddressError::MalformedAddress { .. })
        ));
    }

    #[test]
    fn network_names() {
        assert_eq!(Network::from_str("mainnet").unwrap(), Network::Mainnet);
        assert_eq!(Network::from_str("testnet11").unwrap(), Network::Testnet);
        assert!(Network::from_str("simnet").is_err());
        assert_eq!(Network::Testnet.prefix(), "txch");
        assert_eq!(Network::Mainnet.unit(), "XCH");
    }
}
