//! Chart pattern detectors
//!
//! Every detector follows the same shape: gate on series length, extract
//! local extrema (or slice fixed segments), search the recent look-back for
//! geometry that satisfies the pattern's constraints, score the survivors and
//! project a measured-move target.
//!
//! # Pattern Categories
//!
//! - **Reversal (7)**: Head & Shoulders, Inverse H&S, Double/Triple Top and Bottom,
//!   Falling Wedge
//! - **Continuation (4)**: Ascending/Descending Triangle, Cup and Handle, Bullish Flag

pub mod extrema;
pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod continuation;
pub mod reversal;

// Re-export all detectors for convenience
pub use continuation::*;
pub use extrema::*;
pub use helpers::*;
pub use reversal::*;
