// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{KeyValueStore, KeyValueTxn, KvError, Result};
use acd_types::Hash;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// A log-structured on-disk store. Each commit appends one length-framed
/// batch of put/delete records; an in-memory index maps keys to their
/// latest value's file position. Opening replays only complete batches,
/// so a crash mid-commit rolls the whole commit back.
pub struct LogStore {
    file: Mutex<File>,
    index: RwLock<BTreeMap<Hash, (u64, u32)>>,
}

impl LogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<LogStore> {
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        let mut index = BTreeMap::new();
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        let mut offset = 0u64;
        let mut frame_header = [0u8; 4];
        while offset + 4 <= len {
            file.read_exact(&mut frame_header)?;
            let payload_len = u64::from(u32::from_be_bytes(frame_header));
            let payload_at = offset + 4;
            if payload_at + payload_len > len {
                break; // torn batch, roll back to the previous commit
            }
            let mut payload = vec![0u8; payload_len as usize];
            file.read_exact(&mut payload)?;
            apply_batch(&mut index, &payload, payload_at, offset)?;
            offset = payload_at + payload_len;
        }
        log::debug!(
            "opened log store: {} live keys, {} of {} bytes replayed",
            index.len(),
            offset,
            len
        );

        Ok(LogStore { file: Mutex::new(file), index: RwLock::new(index) })
    }

    fn read_value(&self, at: u64, len: u32) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(at))?;
        let mut value = vec![0u8; len as usize];
        file.read_exact(&mut value)?;
        Ok(value)
    }
}

/// Applies one batch payload to the index. `payload_at` is the payload's
/// file offset, used to index value positions.
fn apply_batch(
    index: &mut BTreeMap<Hash, (u64, u32)>, payload: &[u8], payload_at: u64,
    frame_at: u64,
) -> Result<()> {
    let mut pos = 0usize;
    while pos < payload.len() {
        if payload.len() - pos < 37 {
            return Err(KvError::Corrupt(format!(
                "truncated record inside batch at offset {}",
                frame_at
            )));
        }
        let op = payload[pos];
        let key = Hash::from_slice(&payload[pos + 1..pos + 33])
            .expect("slice of 32 bytes");
        let value_len = u32::from_be_bytes(
            payload[pos + 33..pos + 37].try_into().expect("4 bytes"),
        );
        pos += 37;
        match op {
            OP_PUT => {
                if payload.len() - pos < value_len as usize {
                    return Err(KvError::Corrupt(format!(
                        "value overruns batch at offset {}",
                        frame_at
                    )));
                }
                index.insert(key, (payload_at + pos as u64, value_len));
                pos += value_len as usize;
            }
            OP_DELETE => {
                index.remove(&key);
            }
            other => {
                return Err(KvError::Corrupt(format!(
                    "unknown log op {:#x} at offset {}",
                    other, frame_at
                )));
            }
        }
    }
    Ok(())
}

impl KeyValueStore for LogStore {
    fn begin<'a>(&'a self, writable: bool) -> Box<dyn KeyValueTxn + 'a> {
        Box::new(LogTxn { store: self, writable, writes: BTreeMap::new() })
    }
}

struct LogTxn<'a> {
    store: &'a LogStore,
    writable: bool,
    // None marks a delete. BTreeMap keeps commit order deterministic.
    writes: BTreeMap<Hash, Option<Vec<u8>>>,
}

impl KeyValueTxn for LogTxn<'_> {
    fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(staged.clone());
        }
        let slot = self.store.index.read().get(key).copied();
        match slot {
            None => Ok(None),
            Some((at, len)) => Ok(Some(self.store.read_value(at, len)?)),
        }
    }

    fn put(&mut self, key: Hash, value: Vec<u8>) -> Result<()> {
        if !self.writable {
            return Err(KvError::ReadOnly);
        }
        self.writes.insert(key, Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &Hash) -> Result<()> {
        if !self.writable {
            return Err(KvError::ReadOnly);
        }
        self.writes.insert(*key, None);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let mut payload = Vec::new();
        for (key, value) in &self.writes {
            match value {
                Some(value) => {
                    payload.push(OP_PUT);
                    payload.extend_from_slice(key.as_bytes());
                    payload
                        .extend_from_slice(&(value.len() as u32).to_be_bytes());
                    payload.extend_from_slice(value);
                }
                None => {
                    payload.push(OP_DELETE);
                    payload.extend_from_slice(key.as_bytes());
                    payload.extend_from_slice(&0u32.to_be_bytes());
                }
            }
        }

        let mut file = self.store.file.lock();
        let mut index = self.store.index.write();
        let frame_at = file.seek(SeekFrom::End(0))?;
        file.write_all(&(payload.len() as u32).to_be_bytes())?;
        file.write_all(&payload)?;
        file.sync_data()?;
        apply_batch(&mut index, &payload, frame_at + 4, frame_at)?;
        Ok(())
    }

    fn discard(self: Box<Self>) {}
}
