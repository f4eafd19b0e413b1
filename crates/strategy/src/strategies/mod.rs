mod excursion_stop;
mod price_band;
mod scripted;

pub use excursion_stop::ExcursionStop;
pub use price_band::{band_for, divergence, Band, PriceBand};
pub use scripted::Scripted;
