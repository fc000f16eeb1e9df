//! On-disk format for solved tables.
//!
//! A table file is a fixed header (`MT3S`, version, endianness), a postcard
//! payload holding [`TableMeta`] and both tables as key-sorted [`Record`]s,
//! and a CRC32C trailer.

mod table;

pub use table::{
    Record,
    TableError,
    TableFile,
    TableMeta,
    decode_tables,
    encode_tables,
    read_tables_from_path,
    write_tables_to_path,
};
