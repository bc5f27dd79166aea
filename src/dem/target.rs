//! The 64-bit DEM target encoding.

use std::fmt;

const OBSERVABLE_BIT: u64 = 1 << 63;
const SEPARATOR: u64 = u64::MAX;

/// One target of a [super::DemInstruction::Error]'s target list, or the sole
/// target of a [super::DemInstruction::Detector]/[super::DemInstruction::LogicalObservable].
///
/// Tags a 63-bit id as either a relative detector id or an observable id, with the
/// all-ones value reserved as the *separator* token (`^` in DEM text) marking the
/// boundary between decomposed sub-components of a single error mechanism.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemTarget(u64);

impl fmt::Debug for DemTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_separator() {
            write!(f, "^")
        } else if self.is_observable_id() {
            write!(f, "L{}", self.raw_id())
        } else {
            write!(f, "D{}", self.raw_id())
        }
    }
}

impl DemTarget {
    /// A relative detector id.
    pub fn relative_detector_id(id: u64) -> Self {
        assert!(id < OBSERVABLE_BIT, "detector id too large: {id}");
        Self(id)
    }

    /// A logical observable id.
    pub fn observable_id(id: u32) -> Self {
        Self(id as u64 | OBSERVABLE_BIT)
    }

    /// The separator token (`^`), marking a boundary between decomposed
    /// sub-components within one error's target list.
    pub fn separator() -> Self {
        Self(SEPARATOR)
    }

    /// Whether this is the separator token.
    pub fn is_separator(&self) -> bool {
        self.0 == SEPARATOR
    }

    /// Whether this is an observable id.
    pub fn is_observable_id(&self) -> bool {
        !self.is_separator() && self.0 & OBSERVABLE_BIT != 0
    }

    /// Whether this is a detector id.
    pub fn is_relative_detector_id(&self) -> bool {
        !self.is_separator() && self.0 & OBSERVABLE_BIT == 0
    }

    /// The raw id, stripped of the observable tag bit. Meaningless on a separator.
    pub fn raw_id(&self) -> u64 {
        self.0 & !OBSERVABLE_BIT
    }

    /// Shift a detector id by `delta` (used when a repeated block's detector ids
    /// are offset by a per-iteration stride, or when concatenating DEM fragments).
    /// No-op on observable ids and the separator.
    pub fn shifted(&self, delta: i64) -> Self {
        if !self.is_relative_detector_id() {
            return *self;
        }
        let shifted = (self.raw_id() as i64) + delta;
        assert!(shifted >= 0, "detector id shift went negative");
        Self::relative_detector_id(shifted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_and_observable_are_distinguishable() {
        let d = DemTarget::relative_detector_id(5);
        let l = DemTarget::observable_id(5);
        assert_ne!(d, l);
        assert!(d.is_relative_detector_id());
        assert!(l.is_observable_id());
        assert_eq!(d.raw_id(), l.raw_id());
    }

    #[test]
    fn separator_is_neither() {
        let s = DemTarget::separator();
        assert!(s.is_separator());
        assert!(!s.is_observable_id());
        assert!(!s.is_relative_detector_id());
    }

    #[test]
    fn shift_only_moves_detector_ids() {
        let d = DemTarget::relative_detector_id(10).shifted(-3);
        assert_eq!(d, DemTarget::relative_detector_id(7));
        let l = DemTarget::observable_id(2).shifted(100);
        assert_eq!(l, DemTarget::observable_id(2));
        let s = DemTarget::separator().shifted(100);
        assert!(s.is_separator());
    }
}
