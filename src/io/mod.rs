//! The output boundary between this crate's engines and shot-data encoders.
//!
//! Everything past [ShotSink] — the six textual/binary shot-data formats, the
//! circuit text format, and the DEM text format — belongs to a separate,
//! format-aware crate and isn't implemented here.

mod shot_sink;

pub use shot_sink::{NullSink, ResultTypeTag, ShotSink, VecSink};
