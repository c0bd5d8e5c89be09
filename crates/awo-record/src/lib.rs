//! On-disk run state: the run directory, its manifest, the provenance
//! ledger and the index mirror. Every mutation is schema-checked before it
//! is persisted, and every file is replaced atomically.

pub mod error;
pub mod fsio;
pub mod index;
pub mod layout;
pub mod manifest;
pub mod provenance;
pub mod recorder;
pub mod revalidate;
pub mod schema;
pub mod store;

pub use error::*;
pub use index::*;
pub use layout::*;
pub use manifest::*;
pub use provenance::*;
pub use recorder::*;
pub use revalidate::*;
pub use schema::*;
pub use store::*;
