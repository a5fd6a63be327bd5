//! `lactation-curves` library crate.
//!
//! Fits dairy lactation curve models to test-day milk records and derives
//! their characteristics:
//!
//! - 14 published curve models with a static registry (`models`)
//! - bounded least-squares fitting of the fittable subset (`fit`)
//! - time to peak, peak yield, cumulative yield and persistency, derived
//!   symbolically once per model and cached (`characteristics`, `symbolic`)
//! - the request/response surface of the Bayesian MilkBot service (`bayes`)
//! - the ICAR Test Interval Method for 305-day yields (`icar`, `io`)
//!
//! ```no_run
//! use lactation_curves::domain::{Characteristic, LactationRecord, ModelKind};
//! use lactation_curves::characteristics::{CharacteristicEngine, CharacteristicOptions, ParameterSource};
//!
//! # fn main() -> lactation_curves::error::Result<()> {
//! let record = LactationRecord::new(vec![10, 30, 60, 120, 200, 280], vec![28.0, 34.0, 33.0, 29.0, 24.0, 19.0])?;
//! let engine = CharacteristicEngine::default();
//! let peak_day = engine.calculate_characteristic(
//!     &record,
//!     ModelKind::Wood,
//!     Characteristic::TimeToPeak,
//!     ParameterSource::Frequentist,
//!     &CharacteristicOptions::default(),
//! )?;
//! # let _ = peak_day;
//! # Ok(())
//! # }
//! ```

pub mod bayes;
pub mod characteristics;
pub mod config;
pub mod domain;
pub mod error;
pub mod fit;
pub mod icar;
pub mod io;
pub mod math;
pub mod models;
pub mod symbolic;
