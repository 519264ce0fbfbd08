//! Small shared constants that don't belong to any single `vision::` module.

/// Three-bell terminal cue on camera destabilization (spec §7's `Beep3`
/// equivalent -- see `SPEC_FULL.md`'s supplemented-features note).
pub const CAMERA_DESTABILIZED_BELL: &str = "\x07\x07\x07";

/// Floating point epsilon used across the vision pipeline for "effectively
/// zero" comparisons (chromaticity ratios, histogram normalization).
pub const EPSILON: f64 = 1e-6;
