//! Data models shared across the pipeline.
//!
//! JSON shapes use camelCase keys; confidence tiers serialize as
//! `"high" | "medium" | "low"`.

mod provenance;
mod record;
mod vocabulary;

pub use provenance::*;
pub use record::*;
pub use vocabulary::*;
