//! # folio-shared
//!
//! Types shared by the Folio server and client: the change log and daily
//! backup model, catalog entities, per-day aggregation, and the session
//! token codec.

pub mod aggregate;
pub mod catalog;
pub mod constants;
pub mod error;
pub mod session;
pub mod types;

pub use error::SharedError;
