//! Word-packed bit structures: the substrate the frame sampler, reverse tracker, and
//! circuit/DEM models are all built out of.
//!
//! These are hand-rolled rather than built on a pluggable boolean-vector crate: the
//! transpose trick in [BitTable] and the per-shot word batching in the sampler both
//! need to own the physical word layout, which a backend-agnostic abstraction
//! wouldn't expose.

mod arena;
mod bit_table;
mod bit_vec;
mod sparse_xor;
mod word;

pub use arena::{Arena, ArenaSlice};
pub use bit_table::BitTable;
pub use bit_vec::BitVec;
pub use sparse_xor::SparseXorVec;
pub use word::{DefaultWord, Word};
