//! SHA-1 helpers shared by the patch engine and `sha1_check`.

use crate::errors::PatchError;
use sha1::{Digest, Sha1};

pub type Sha1Digest = [u8; 20];

pub fn sha1(data: &[u8]) -> Sha1Digest {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Sha1::digest(data));
    out
}

/// Lowercase hex digest of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

/// Parse exactly 40 hex digits, either case.
pub fn parse_sha1(text: &str) -> Result<Sha1Digest, PatchError> {
    let mut out = [0u8; 20];
    hex::decode_to_slice(text, &mut out).map_err(|_| PatchError::BadDigest(text.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    #[test]
    fn hex_digest_is_lowercase() {
        assert_eq!(sha1_hex(b"abc"), ABC);
    }

    #[test]
    fn parse_accepts_uppercase() {
        assert_eq!(parse_sha1(&ABC.to_uppercase()).unwrap(), sha1(b"abc"));
    }

    #[test]
    fn parse_rejects_wrong_length_and_junk() {
        assert!(parse_sha1(&ABC[..39]).is_err());
        assert!(parse_sha1(&format!("{}00", ABC)).is_err());
        assert!(parse_sha1(&ABC.replace('a', "g")).is_err());
    }
}
