//! Domain layer: models, errors, and ports. No I/O.

pub mod errors;
pub mod models;
pub mod ports;
