// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::*;
use acd_types::{sha256, Hash, Url};

#[derive(Debug, Clone, Default, PartialEq)]
struct Sample {
    kind: u64,
    label: String,
    payload: Vec<u8>,
    digest: Hash,
    amount: u128,
    origin: Option<Url>,
    children: Vec<Child>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Child {
    index: u64,
    flag: bool,
}

impl Encodable for Child {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.index);
        w.write_bool(2, self.flag);
    }
}

impl Decodable for Child {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(Child { index: r.read_uint(1)?, flag: r.read_bool(2)? })
    }
}

impl Encodable for Sample {
    fn append(&self, w: &mut Writer) {
        w.write_uint(1, self.kind);
        w.write_string(2, &self.label);
        w.write_bytes(3, &self.payload);
        w.write_hash(4, &self.digest);
        w.write_biguint(5, self.amount);
        if let Some(origin) = &self.origin {
            w.write_url(6, origin);
        }
        w.write_values(7, &self.children);
    }
}

impl Decodable for Sample {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecoderError> {
        Ok(Sample {
            kind: r.read_uint(1)?,
            label: r.read_string(2)?,
            payload: r.read_bytes(3)?,
            digest: r.read_hash(4)?,
            amount: r.read_biguint(5)?,
            origin: r.read_url(6)?,
            children: r.read_values(7)?,
        })
    }
}

fn sample() -> Sample {
    Sample {
        kind: 7,
        label: "send tokens".into(),
        payload: vec![1, 2, 3],
        digest: sha256(b"entry"),
        amount: 30_000_000_000,
        origin: Some(Url::parse("acc://alice/tokens").unwrap()),
        children: vec![
            Child { index: 1, flag: true },
            Child { index: 2, flag: false },
        ],
    }
}

#[test]
fn round_trip() {
    let value = sample();
    let bytes = encode(&value);
    assert_eq!(decode::<Sample>(&bytes).unwrap(), value);
}

#[test]
fn encoding_is_canonical() {
    let bytes = encode(&sample());
    let decoded = decode::<Sample>(&bytes).unwrap();
    assert_eq!(encode(&decoded), bytes);
}

#[test]
fn defaults_encode_to_nothing() {
    assert!(encode(&Sample::default()).is_empty());
    assert_eq!(decode::<Sample>(&[]).unwrap(), Sample::default());
}

#[test]
fn zero_fields_are_omitted() {
    let value = Sample { kind: 1, ..Default::default() };
    // One tag byte plus one value byte.
    assert_eq!(encode(&value).len(), 2);
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut bytes = encode(&sample());
    bytes.push(0);
    assert!(matches!(
        decode::<Sample>(&bytes),
        Err(DecoderError::TrailingBytes(1))
    ));
}

#[test]
fn out_of_order_fields_are_rejected() {
    // field 2 then field 1
    let mut bytes = Vec::new();
    write_uvarint(&mut bytes, 2);
    write_uvarint(&mut bytes, 1);
    bytes.push(b'x');
    write_uvarint(&mut bytes, 1);
    write_uvarint(&mut bytes, 9);
    assert!(matches!(
        decode::<Sample>(&bytes),
        Err(DecoderError::FieldOutOfOrder { last: 2, got: 1 })
    ));
}

#[test]
fn non_minimal_biguint_is_rejected() {
    let mut bytes = Vec::new();
    write_uvarint(&mut bytes, 5); // amount field
    write_uvarint(&mut bytes, 2);
    bytes.extend_from_slice(&[0x00, 0x01]); // leading zero
    assert!(matches!(
        decode::<Sample>(&bytes),
        Err(DecoderError::InvalidValue("biguint", _))
    ));
}

#[test]
fn repeated_field_preserves_order() {
    let value = Sample {
        children: (0..5).map(|i| Child { index: i, flag: i % 2 == 0 }).collect(),
        ..Default::default()
    };
    let decoded = decode::<Sample>(&encode(&value)).unwrap();
    assert_eq!(decoded.children, value.children);
}
