// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    errors::UrlError,
    hash::{sha256, Hash},
    url::Url,
};

/// Lite account addresses encode a key hash directly in the authority, so
/// they exist without being created by a transaction.
///
/// A lite identity authority is `hex(keyHash[0..20]) || hex(checksum)`
/// where the checksum is the last 4 bytes of SHA-256 of the 40-character
/// key-hash hex string. A lite token account is a lite identity with the
/// token URL as its path. A lite data account authority is the 64-character
/// hex of a 32-byte chain ID with no checksum.

fn checksum(key_hex: &str) -> [u8; 4] {
    let digest = sha256(key_hex.as_bytes());
    let mut c = [0u8; 4];
    c.copy_from_slice(&digest.0[28..]);
    c
}

/// Builds the lite identity URL for a 20-byte public key hash.
pub fn lite_identity_url(key_hash: &[u8; 20]) -> Url {
    let key_hex = hex::encode(key_hash);
    let authority = format!("{}{}", key_hex, hex::encode(checksum(&key_hex)));
    Url::parse(&authority).expect("hex authority is always a valid URL")
}

/// Builds the lite token account URL for a key hash and a token URL, e.g.
/// `acc://<keyhash+checksum>/ACME`.
pub fn lite_token_account_url(key_hash: &[u8; 20], token: &Url) -> Url {
    let mut url = lite_identity_url(key_hash);
    url = url.join(token.authority());
    for segment in token.path_segments() {
        url = url.join(segment);
    }
    url
}

/// Builds a lite data account URL from a 32-byte chain ID.
pub fn lite_data_account_url(chain_id: &Hash) -> Url {
    Url::parse(&chain_id.to_hex()).expect("hex authority is always valid")
}

/// Parses a lite identity authority, returning the 20-byte key hash.
/// The URL must have no path.
pub fn parse_lite_identity(url: &Url) -> Result<[u8; 20], UrlError> {
    let key = parse_lite_authority(url)?;
    if !url.path().is_empty() {
        return Err(UrlError::NotLite(url.to_string()));
    }
    Ok(key)
}

/// Parses a lite token account URL, returning the key hash and the token
/// URL the account holds.
pub fn parse_lite_token_address(
    url: &Url,
) -> Result<([u8; 20], Url), UrlError> {
    let key = parse_lite_authority(url)?;
    let mut segments = url.path_segments();
    let token_authority =
        segments.next().ok_or_else(|| UrlError::NotLite(url.to_string()))?;
    let mut token = Url::parse(token_authority)?;
    for segment in segments {
        token = token.join(segment);
    }
    Ok((key, token))
}

/// Parses a lite data account URL, returning the 32-byte chain ID.
pub fn parse_lite_data_address(url: &Url) -> Result<Hash, UrlError> {
    if !url.path().is_empty() {
        return Err(UrlError::NotLite(url.to_string()));
    }
    Hash::from_hex(url.authority())
        .ok_or_else(|| UrlError::NotLite(url.to_string()))
}

fn parse_lite_authority(url: &Url) -> Result<[u8; 20], UrlError> {
    let authority = url.authority();
    if authority.len() != 48 {
        return Err(UrlError::NotLite(url.to_string()));
    }
    let bytes = hex::decode(authority)
        .map_err(|_| UrlError::NotLite(url.to_string()))?;
    let key_hex = &authority[..40];
    if checksum(key_hex)[..] != bytes[20..] {
        return Err(UrlError::BadChecksum(url.to_string()));
    }
    let mut key = [0u8; 20];
    key.copy_from_slice(&bytes[..20]);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts;

    fn key_hash() -> [u8; 20] {
        let digest = sha256(b"test key");
        let mut kh = [0u8; 20];
        kh.copy_from_slice(&digest.0[..20]);
        kh
    }

    #[test]
    fn lite_identity_round_trip() {
        let url = lite_identity_url(&key_hash());
        assert_eq!(parse_lite_identity(&url).unwrap(), key_hash());
    }

    #[test]
    fn lite_token_round_trip() {
        let url = lite_token_account_url(&key_hash(), &consts::acme_url());
        let (key, token) = parse_lite_token_address(&url).unwrap();
        assert_eq!(key, key_hash());
        assert_eq!(token, consts::acme_url());
    }

    #[test]
    fn corrupt_checksum_is_rejected() {
        let url = lite_identity_url(&key_hash());
        let mut s = url.to_string();
        // Flip the final checksum nibble.
        let last = s.pop().unwrap();
        s.push(if last == '0' { '1' } else { '0' });
        let bad = Url::parse(&s).unwrap();
        assert!(matches!(
            parse_lite_identity(&bad),
            Err(UrlError::BadChecksum(_))
        ));
    }

    #[test]
    fn ordinary_urls_are_not_lite() {
        let url = Url::parse("acc://alice/tokens").unwrap();
        assert!(parse_lite_token_address(&url).is_err());
    }
}
