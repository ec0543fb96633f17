//! Shared infrastructure for inkpress binaries.
//!
//! Currently this is limited to database pool construction, so the API
//! server and any future background binaries build their pools the same way.

mod db;

pub use db::create_pool;
