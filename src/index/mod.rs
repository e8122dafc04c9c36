//! Index Module
//!
//! Two-level hash index: main key -> group, (main key, unique key) -> record.
//!
//! ## Responsibilities
//! - Locate or create the group for a main key
//! - Locate a record within its group through the record hash
//! - Keep each group's records in an explicit order (head / tail insertion,
//!   optional move-on-update)
//! - Bound node counts; a full table is reported as `OutOfSpace`
//!
//! ## Structure
//! ```text
//!  group buckets            groups                  record chain (per group)
//! ┌───┐                ┌──────────────┐        ┌────┐   ┌────┐   ┌────┐
//! │ 0 │──────────────▶ │ main key  h  │─head─▶ │ r1 │◀─▶│ r2 │◀─▶│ r3 │ ◀─tail
//! ├───┤                └──────────────┘        └────┘   └────┘   └────┘
//! │ 1 │                                           ▲ bucket_next links
//! └───┘                record buckets ────────────┘ (by pair hash)
//! ```
//! Nodes live in fixed-capacity slabs addressed by typed ids; key bytes live
//! in the shard's chunk arenas.

mod slab;
mod table;

pub use slab::Slab;
pub use table::{GroupId, GroupNode, HashIndex, RecordId, RecordNode};
