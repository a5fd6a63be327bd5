//! Lactation curve characteristics: time to peak, peak yield, cumulative
//! yield and persistency.
//!
//! Closed forms are derived once per model through the symbolic engine and
//! cached; anything without a usable closed form is evaluated on the day grid.

pub mod cache;
pub mod engine;
pub mod numeric;
pub mod persistency;

pub use cache::{CacheEntry, CacheKey, CharacteristicCache, Evaluator, Origin};
pub use engine::{CharacteristicEngine, CharacteristicOptions, ParameterSource};
