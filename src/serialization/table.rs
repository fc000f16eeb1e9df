use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::bag::BagConfig;
use crate::key::StateKey;
use crate::solver::{Answer, Tables};

const MAGIC: &[u8; 4] = b"MT3S"; // ASCII magic
const VERSION: u8 = 1;
const ENDIAN_LE: u8 = 0; // 0 = little-endian
const HEADER_LEN: usize = 4 + 1 + 1;
const TRAILER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Bag refill the tables were solved under.
    pub refill: BagConfig,
    pub before_len: u64,
    pub after_len: u64,
    pub build_s: f32,
    pub created_unix_s: u64,
}

impl TableMeta {
    /// Meta for freshly built `tables`, stamped with the current time.
    pub fn for_tables(refill: BagConfig, tables: &Tables, build_s: f32) -> Self {
        let created_unix_s = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        Self {
            refill,
            before_len: tables.before_len() as u64,
            after_len: tables.after_len() as u64,
            build_s,
            created_unix_s,
        }
    }

    /// Fail unless the tables were solved under `refill`.
    pub fn check(&self, refill: &BagConfig) -> Result<(), TableError> {
        if self.refill != *refill {
            return Err(TableError::ConfigMismatch { stored: self.refill.refill, requested: refill.refill });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: StateKey,
    pub answer: Answer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFile {
    pub meta: TableMeta,
    /// Sorted by key.
    pub before: Vec<Record>,
    /// Sorted by key.
    pub after: Vec<Record>,
}

impl TableFile {
    pub fn new(meta: TableMeta, tables: &Tables) -> Self {
        let records = |v: Vec<(StateKey, Answer)>| v.into_iter().map(|(key, answer)| Record { key, answer }).collect();
        Self { meta, before: records(tables.before_entries()), after: records(tables.after_entries()) }
    }

    pub fn into_tables(self) -> Tables {
        Tables::from_entries(
            self.before.into_iter().map(|r| (r.key, r.answer)),
            self.after.into_iter().map(|r| (r.key, r.answer)),
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("unsupported endianness")]
    Endianness,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
    #[error("tables were solved with bag refill {stored:?}, not {requested:?}")]
    ConfigMismatch { stored: [u8; 3], requested: [u8; 3] },
}

/// Encode tables behind the magic/version/endianness header, with a CRC32C
/// trailer over every preceding byte.
///
/// Records are written in key order, so equal tables and meta always give
/// identical bytes.
pub fn encode_tables(meta: &TableMeta, tables: &Tables) -> Result<Vec<u8>, TableError> {
    let file = TableFile::new(meta.clone(), tables);
    let payload = postcard::to_allocvec(&file)?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(ENDIAN_LE);
    buf.extend_from_slice(&payload);

    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

pub fn decode_tables(bytes: &[u8]) -> Result<(TableMeta, Tables), TableError> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(TableError::Malformed);
    }

    // Validate checksum first
    let (content, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
    let file_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if file_crc != crc32c::crc32c(content) {
        return Err(TableError::Checksum);
    }

    if &content[..4] != MAGIC || content[4] != VERSION {
        return Err(TableError::MagicOrVersion);
    }
    if content[5] != ENDIAN_LE {
        return Err(TableError::Endianness);
    }

    let file: TableFile = postcard::from_bytes(&content[HEADER_LEN..])?;
    if file.before.len() as u64 != file.meta.before_len || file.after.len() as u64 != file.meta.after_len {
        return Err(TableError::Malformed);
    }
    let meta = file.meta.clone();
    Ok((meta, file.into_tables()))
}

pub fn write_tables_to_path<P: AsRef<Path>>(path: P, meta: &TableMeta, tables: &Tables) -> Result<(), TableError> {
    let data = encode_tables(meta, tables)?;
    let mut f = fs::File::create(path)?;
    f.write_all(&data)?;
    Ok(())
}

pub fn read_tables_from_path<P: AsRef<Path>>(path: P) -> Result<(TableMeta, Tables), TableError> {
    let bytes = fs::read(path)?;
    decode_tables(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample() -> (TableMeta, Tables) {
        let tables = Tables::from_entries(
            [(42, Answer::terminal(108.0)), (7, Answer { min: 3.0, avg: 12.5, max: 30.0 })],
            [(11, Answer { min: 0.0, avg: 1.0 / 3.0, max: 9.0 })],
        );
        let meta = TableMeta {
            refill: BagConfig::default(),
            before_len: 2,
            after_len: 1,
            build_s: 0.5,
            created_unix_s: 1_700_000_000,
        };
        (meta, tables)
    }

    #[test]
    fn file_roundtrip() {
        let (meta, tables) = sample();
        let tmp = NamedTempFile::new().unwrap();
        write_tables_to_path(tmp.path(), &meta, &tables).unwrap();
        let (m2, t2) = read_tables_from_path(tmp.path()).unwrap();
        assert_eq!(m2, meta);
        assert_eq!(t2, tables);
    }

    #[test]
    fn encoding_is_deterministic() {
        let (meta, tables) = sample();
        let a = encode_tables(&meta, &tables).unwrap();
        // same content inserted in another order
        let shuffled = Tables::from_entries(tables.before_entries().into_iter().rev(), tables.after_entries());
        let b = encode_tables(&meta, &shuffled).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..4], MAGIC);
    }

    #[test]
    fn corrupted_byte_fails_checksum() {
        let (meta, tables) = sample();
        let mut bytes = encode_tables(&meta, &tables).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(decode_tables(&bytes), Err(TableError::Checksum)));
    }

    #[test]
    fn short_input_is_malformed() {
        assert!(matches!(decode_tables(b"MT3S"), Err(TableError::Malformed)));
        assert!(matches!(decode_tables(&[]), Err(TableError::Malformed)));
    }

    #[test]
    fn header_is_checked() {
        let (meta, tables) = sample();
        let bytes = encode_tables(&meta, &tables).unwrap();
        let reseal = |mut b: Vec<u8>| {
            b.truncate(b.len() - TRAILER_LEN);
            let crc = crc32c::crc32c(&b);
            b.extend_from_slice(&crc.to_le_bytes());
            b
        };
        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(decode_tables(&reseal(bad_magic)), Err(TableError::MagicOrVersion)));
        let mut bad_version = bytes.clone();
        bad_version[4] = VERSION + 1;
        assert!(matches!(decode_tables(&reseal(bad_version)), Err(TableError::MagicOrVersion)));
        let mut big_endian = bytes;
        big_endian[5] = 1;
        assert!(matches!(decode_tables(&reseal(big_endian)), Err(TableError::Endianness)));
    }

    #[test]
    fn count_mismatch_is_malformed() {
        let (mut meta, tables) = sample();
        meta.before_len = 5;
        let bytes = encode_tables(&meta, &tables).unwrap();
        assert!(matches!(decode_tables(&bytes), Err(TableError::Malformed)));
    }

    #[test]
    fn solved_tables_encode_identically() {
        use crate::solver::{Solver, SolverConfig};
        let cfg = SolverConfig { bag: BagConfig { refill: [0, 1, 1] }, ..Default::default() };
        let mut first = Solver::with_config(cfg.clone());
        first.initialize();
        let mut second = Solver::with_config(cfg.clone());
        second.initialize();
        let meta = TableMeta { created_unix_s: 0, build_s: 0.0, ..TableMeta::for_tables(cfg.bag, first.tables(), 0.0) };
        let a = encode_tables(&meta, first.tables()).unwrap();
        let b = encode_tables(&meta, second.tables()).unwrap();
        assert_eq!(a, b);
        let (m, t) = decode_tables(&a).unwrap();
        assert_eq!(m, meta);
        assert_eq!(&t, first.tables());
    }

    #[test]
    fn config_check() {
        let (meta, _) = sample();
        assert!(meta.check(&BagConfig::default()).is_ok());
        let other = BagConfig { refill: [2, 2, 2] };
        assert!(matches!(
            meta.check(&other),
            Err(TableError::ConfigMismatch { stored: [1, 1, 1], requested: [2, 2, 2] })
        ));
    }
}
