//! I/O module
//!
//! Handles seed loading, CSV operation parsing and position output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, position serialization)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `seed` - JSON seed loading and store provisioning

pub mod async_reader;
pub mod csv_format;
pub mod seed;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_operation, write_positions_csv, CsvOperation};
pub use seed::{load_seed, provision, ProvisionSummary, Seed};
pub use sync_reader::SyncReader;
