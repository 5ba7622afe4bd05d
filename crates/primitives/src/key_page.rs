// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::account::AccountAuth;
use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::Url;

/// One key slot of a key page: a key hash, and optionally the authority
/// the slot is delegated to instead of a directly held key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpec {
    pub public_key_hash: Vec<u8>,
    pub delegate: Option<Url>,
    pub last_used: u64,
}

impl Encodable for KeySpec {
    fn append(&self, w: &mut Writer) {
        w.write_bytes(1, &self.public_key_hash);
        if let Some(delegate) = &self.delegate {
            w.write_url(2, delegate);
        }
        w.write_uint(3, self.last_used);
    }
}

impl Decodable for KeySpec {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(KeySpec {
            public_key_hash: r.read_bytes(1)?,
            delegate: r.read_url(2)?,
            last_used: r.read_uint(3)?,
        })
    }
}

/// A signer: an ordered list of key slots with an M-of-N accept threshold.
/// Pages belong to a key book; page 1 is the book's highest priority page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub url: Url,
    pub credit_balance: u64,
    pub accept_threshold: u64,
    pub reject_threshold: u64,
    pub version: u64,
    pub keys: Vec<KeySpec>,
}

impl KeyPage {
    /// The index of the slot holding a key hash, if any.
    pub fn entry_index(&self, key_hash: &[u8]) -> Option<usize> {
        self.keys.iter().position(|k| k.public_key_hash == key_hash)
    }

    /// The book this page belongs to: its identity URL.
    pub fn book_url(&self) -> Url { self.url.identity() }

    pub fn threshold(&self) -> u64 { self.accept_threshold.max(1) }
}

impl KeyPage {
    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_uint(3, self.credit_balance);
        w.write_uint(4, self.accept_threshold);
        w.write_uint(5, self.reject_threshold);
        w.write_uint(6, self.version);
        w.write_values(7, &self.keys);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(KeyPage {
            url: r.read_required_url(2)?,
            credit_balance: r.read_uint(3)?,
            accept_threshold: r.read_uint(4)?,
            reject_threshold: r.read_uint(5)?,
            version: r.read_uint(6)?,
            keys: r.read_values(7)?,
        })
    }
}

/// A key book: the authority object owning one or more pages. Pages are
/// addressed as `<book>/1`, `<book>/2`, ...
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBook {
    pub url: Url,
    pub auth: AccountAuth,
    pub page_count: u64,
}

impl KeyBook {
    pub fn page_url(&self, page_number: u64) -> Url {
        self.url.join(&page_number.to_string())
    }

    pub(crate) fn append_body(&self, w: &mut Writer) {
        w.write_url(2, &self.url);
        w.write_value(3, &self.auth);
        w.write_uint(4, self.page_count);
    }

    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(KeyBook {
            url: r.read_required_url(2)?,
            auth: r.read_value(3)?.unwrap_or_default(),
            page_count: r.read_uint(4)?,
        })
    }
}
