//! Byte array <-> hex string conversion for keys and OSCORE material

use crate::{Error, Result};

/// Encode bytes as an uppercase hex string
pub fn to_hex(bytes: &[u8]) -> String {
    ::hex::encode_upper(bytes)
}

/// Decode a hex string, case-insensitive, ignoring surrounding whitespace
pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(Error::InvalidHex(format!(
            "odd number of digits ({}) in '{}'",
            s.len(),
            s
        )));
    }
    Ok(::hex::decode(s)?)
}

/// Whether the string is a well-formed hex encoding
pub fn is_hex(s: &str) -> bool {
    let s = s.trim();
    s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uppercase() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x10, 0xff]), "00AB10FF");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_decode_mixed_case_and_whitespace() {
        assert_eq!(from_hex(" 00aB10Ff\n").unwrap(), vec![0x00, 0xab, 0x10, 0xff]);
        assert!(from_hex("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(from_hex("abc"), Err(Error::InvalidHex(_))));
        assert!(matches!(from_hex("zz"), Err(Error::InvalidHex(_))));
        assert!(!is_hex("abc"));
        assert!(!is_hex("0g"));
        assert!(is_hex("DEADbeef"));
    }
}
