// Card ETL - Core Library
// Loads associate, branch and card transaction extracts into a
// dimensional schema. Exposes all modules for the CLI and tests.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod normalizer;
pub mod operators;
pub mod parser;
pub mod pipeline;
pub mod rules;

// Re-export commonly used types
pub use config::{DatabaseConfig, EtlConfig, InputEncoding, InputFiles, RowErrorPolicy};
pub use db::{
    Batch, LoadEvent, Loader, SqliteLoader,
    setup_database, insert_event, get_events_for_entity, count_rows,
};
pub use entities::{
    Entity, EntityTransformer, LoadRow, get_transformer, derive_branch_id,
    AssociateRow, BranchRow, TransactionRow,
    AssociateTransformer, BranchTransformer, TransactionTransformer,
};
pub use error::{ErrorKind, EtlError};
pub use normalizer::{FieldMap, RecordNormalizer};
pub use operators::{
    Operator, zero_pad, uppercase, reencode, strip_diacritics_and_symbols,
};
pub use parser::{
    CsvSource, RawRecord, ReadOptions,
    parse_amount, parse_date, parse_timestamp,
};
pub use pipeline::{import, load_entity, run, EntityReport, LoadReport};
pub use rules::{RuleDef, RuleTable, BUILTIN_RULES};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
