//! Visibility Engine: is a sky position observable from a ground site now,
//! later within a horizon, or not at all.
//!
//! Everything here is a pure function of its inputs. Time enters only
//! through the `at` argument, so identical calls give identical results.

pub mod engine;
pub mod ephemeris;
pub mod error;
pub mod observer;

pub use engine::{
  SkySample, Visibility, VisibilityResult, altitude_series, evaluate,
  evaluate_all,
};
pub use error::{Error, Result};
pub use observer::{Constraints, Observer};

#[cfg(test)]
mod tests;
