pub mod filename;
pub mod spool;
