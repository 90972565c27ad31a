use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const ADDRESS_LENGTH: usize = 20;

/// Number of fractional digits carried by a [`DecCoin`].
pub const DEC_PRECISION: u32 = 18;

const DEC_ONE: u128 = 10u128.pow(DEC_PRECISION);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid bech32 address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("address prefix mismatch: expected {expected}, got {got}")]
    PrefixMismatch { expected: String, got: String },

    #[error("invalid coin expression: {0}")]
    InvalidCoin(String),

    #[error("invalid denomination: {0}")]
    InvalidDenom(String),
}

// --- Addresses ---

/// Raw 20-byte account address. Rendered with a bech32 human readable prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccAddress(pub [u8; ADDRESS_LENGTH]);

impl fmt::Debug for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccAddress({})", hex::encode_upper(self.0))
    }
}

impl AccAddress {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != ADDRESS_LENGTH {
            return Err(TypesError::InvalidAddress {
                address: hex::encode(bytes),
                reason: format!("expected {} bytes, got {}", ADDRESS_LENGTH, bytes.len()),
            });
        }
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(bytes);
        Ok(AccAddress(arr))
    }

    /// Decode a bech32 string, returning the human readable part alongside the address.
    pub fn decode_bech32(s: &str) -> Result<(String, Self), TypesError> {
        let invalid = |reason: String| TypesError::InvalidAddress {
            address: s.to_string(),
            reason,
        };

        let (hrp, data, variant) = bech32::decode(s).map_err(|e| invalid(e.to_string()))?;
        if variant != Variant::Bech32 {
            return Err(invalid("bech32m encoding is not an account address".to_string()));
        }
        let bytes = Vec::<u8>::from_base32(&data).map_err(|e| invalid(e.to_string()))?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(invalid(format!(
                "expected {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            )));
        }

        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok((hrp, AccAddress(arr)))
    }

    /// Decode a bech32 string and require the given account prefix.
    pub fn from_bech32(s: &str, prefix: &str) -> Result<Self, TypesError> {
        let (hrp, addr) = Self::decode_bech32(s)?;
        if hrp != prefix {
            return Err(TypesError::PrefixMismatch {
                expected: prefix.to_string(),
                got: hrp,
            });
        }
        Ok(addr)
    }

    pub fn to_bech32(&self, prefix: &str) -> Result<String, TypesError> {
        bech32::encode(prefix, self.0.to_base32(), Variant::Bech32).map_err(|e| {
            TypesError::InvalidAddress {
                address: hex::encode(self.0),
                reason: e.to_string(),
            }
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// --- Coins ---

fn validate_denom(denom: &str) -> Result<(), TypesError> {
    let mut chars = denom.chars();
    let starts_with_letter = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    let body_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));

    if !starts_with_letter || !body_ok || denom.len() < 2 || denom.len() > 128 {
        return Err(TypesError::InvalidDenom(denom.to_string()));
    }
    Ok(())
}

/// Split "<amount><denom>" at the first character that cannot belong to a number.
fn split_coin_expr(s: &str) -> Result<(&str, &str), TypesError> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| TypesError::InvalidCoin(s.to_string()))?;
    let (amount, denom) = s.split_at(split);
    if amount.is_empty() {
        return Err(TypesError::InvalidCoin(s.to_string()));
    }
    validate_denom(denom)?;
    Ok((amount, denom))
}

/// Integer token amount in a single denomination, e.g. `1000uatom`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, denom) = split_coin_expr(s)?;
        let amount = amount
            .parse::<u128>()
            .map_err(|_| TypesError::InvalidCoin(s.to_string()))?;
        Ok(Coin::new(amount, denom))
    }
}

/// Decimal amount coin used for gas prices, e.g. `0.025uatom`.
///
/// The amount is stored as a fixed-point integer with [`DEC_PRECISION`] decimals.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecCoin {
    pub denom: String,
    atto: u128,
}

impl DecCoin {
    /// Parse a comma separated list such as `0.025uatom,1stake`. Empty input yields no coins.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, TypesError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(DecCoin::from_str)
            .collect()
    }

    /// Fee owed for `gas` units at this price, rounded up to a whole coin.
    pub fn fee_for_gas(&self, gas: u64) -> Coin {
        let scaled = self.atto.saturating_mul(gas as u128);
        let whole = scaled / DEC_ONE;
        let amount = if scaled % DEC_ONE == 0 { whole } else { whole + 1 };
        Coin::new(amount, self.denom.clone())
    }

    pub fn is_zero(&self) -> bool {
        self.atto == 0
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.atto / DEC_ONE;
        let frac = self.atto % DEC_ONE;
        if frac == 0 {
            return write!(f, "{}{}", whole, self.denom);
        }
        let frac = format!("{:018}", frac);
        write!(f, "{}.{}{}", whole, frac.trim_end_matches('0'), self.denom)
    }
}

impl FromStr for DecCoin {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, denom) = split_coin_expr(s)?;
        let invalid = || TypesError::InvalidCoin(s.to_string());

        let (whole, frac) = match amount.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (amount, ""),
        };
        if whole.is_empty() || frac.len() > DEC_PRECISION as usize || frac.contains('.') {
            return Err(invalid());
        }

        let whole = whole.parse::<u128>().map_err(|_| invalid())?;
        let frac = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = DEC_PRECISION as usize);
            padded.parse::<u128>().map_err(|_| invalid())?
        };

        let atto = whole
            .checked_mul(DEC_ONE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(invalid)?;

        Ok(DecCoin {
            denom: denom.to_string(),
            atto,
        })
    }
}

impl Serialize for DecCoin {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DecCoin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DecCoin::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Integer amounts travel as decimal strings on the wire.
mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bech32_roundtrip_with_prefix() {
        let addr = AccAddress([7u8; ADDRESS_LENGTH]);
        let encoded = addr.to_bech32("cosmos").unwrap();
        assert!(encoded.starts_with("cosmos1"));

        let decoded = AccAddress::from_bech32(&encoded, "cosmos").unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_bech32_prefix_mismatch() {
        let encoded = AccAddress([1u8; ADDRESS_LENGTH]).to_bech32("osmo").unwrap();
        let err = AccAddress::from_bech32(&encoded, "cosmos").unwrap_err();
        assert_eq!(
            err,
            TypesError::PrefixMismatch {
                expected: "cosmos".to_string(),
                got: "osmo".to_string()
            }
        );
    }

    #[test]
    fn test_bech32_rejects_garbage_and_bad_checksum() {
        assert!(AccAddress::from_bech32("cosmos1abc", "cosmos").is_err());
        assert!(AccAddress::from_bech32("", "cosmos").is_err());

        let mut encoded = AccAddress([3u8; ADDRESS_LENGTH]).to_bech32("cosmos").unwrap();
        let last = encoded.pop().unwrap();
        encoded.push(if last == 'q' { 'p' } else { 'q' });
        assert!(AccAddress::from_bech32(&encoded, "cosmos").is_err());
    }

    #[test]
    fn test_coin_parse_and_display() {
        let coin: Coin = "1000uatom".parse().unwrap();
        assert_eq!(coin, Coin::new(1000, "uatom"));
        assert_eq!(coin.to_string(), "1000uatom");

        assert!("uatom".parse::<Coin>().is_err());
        assert!("1000".parse::<Coin>().is_err());
        assert!("1.5uatom".parse::<Coin>().is_err());
        assert!("10u".parse::<Coin>().is_err());
    }

    #[test]
    fn test_coin_serializes_amount_as_string() {
        let json = serde_json::to_value(Coin::new(5000, "uatom")).unwrap();
        assert_eq!(json, serde_json::json!({"amount": "5000", "denom": "uatom"}));
    }

    #[test]
    fn test_dec_coin_parse() {
        let price: DecCoin = "0.025uatom".parse().unwrap();
        assert_eq!(price.denom, "uatom");
        assert_eq!(price.to_string(), "0.025uatom");

        let whole: DecCoin = "2stake".parse().unwrap();
        assert_eq!(whole.to_string(), "2stake");

        assert!("0.0000000000000000001uatom".parse::<DecCoin>().is_err());
        assert!(".5uatom".parse::<DecCoin>().is_err());
    }

    #[test]
    fn test_dec_coin_list() {
        let prices = DecCoin::parse_list("0.01uatom, 1stake").unwrap();
        assert_eq!(prices.len(), 2);
        assert!(DecCoin::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_fee_for_gas_rounds_up() {
        let price: DecCoin = "0.025uatom".parse().unwrap();
        assert_eq!(price.fee_for_gas(200_000), Coin::new(5000, "uatom"));
        assert_eq!(price.fee_for_gas(1), Coin::new(1, "uatom"));

        let zero: DecCoin = "0uatom".parse().unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero.fee_for_gas(200_000).amount, 0);
    }
}
