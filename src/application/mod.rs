//! Application layer: manifest resolution, job scheduling and the use cases built on them

pub mod services;
pub mod use_cases;
