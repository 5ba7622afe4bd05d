// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use acd_encoding::{Decodable, DecoderError, Encodable, Reader, Writer};
use acd_types::{sha256, Hash};
use sha2::{Digest, Sha256};

/// An entry written to a data account: optional external-reference parts
/// followed by the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataEntry {
    pub extra: Vec<Vec<u8>>,
    pub data: Vec<u8>,
}

impl DataEntry {
    pub fn from_data(data: impl Into<Vec<u8>>) -> DataEntry {
        DataEntry { extra: Vec::new(), data: data.into() }
    }

    /// The entry hash: SHA-256 over the SHA-256 of each part in order.
    /// Hashing parts individually keeps the hash stable under framing.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        for part in &self.extra {
            hasher.update(sha256(part).as_bytes());
        }
        hasher.update(sha256(&self.data).as_bytes());
        Hash(hasher.finalize().into())
    }

    /// The total size of all parts, used by the fee schedule.
    pub fn size(&self) -> usize {
        self.extra.iter().map(Vec::len).sum::<usize>() + self.data.len()
    }
}

impl Encodable for DataEntry {
    fn append(&self, w: &mut Writer) {
        w.write_bytes_list(1, self.extra.iter().map(Vec::as_slice));
        w.write_bytes(2, &self.data);
    }
}

impl Decodable for DataEntry {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(DataEntry { extra: r.read_bytes_list(1)?, data: r.read_bytes(2)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_on_part_boundaries() {
        let a = DataEntry { extra: vec![b"ab".to_vec()], data: b"c".to_vec() };
        let b = DataEntry { extra: vec![b"a".to_vec()], data: b"bc".to_vec() };
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn codec_round_trip() {
        let entry = DataEntry {
            extra: vec![b"ref".to_vec(), Vec::new()],
            data: b"payload".to_vec(),
        };
        let bytes = acd_encoding::encode(&entry);
        assert_eq!(acd_encoding::decode::<DataEntry>(&bytes).unwrap(), entry);
    }
}
