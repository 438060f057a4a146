pub mod import;
pub mod status;

pub const DEFAULT_SCRIPT: &str = "./import.sql";
pub const DEFAULT_LEDGER: &str = "./imports.json";
