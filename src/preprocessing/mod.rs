//! Feature preprocessing
//!
//! Standardization of the weather feature matrix. The scaler is fitted once
//! over the full cleaned dataset and reused for every prediction.

mod scaler;

pub use scaler::StandardScaler;
