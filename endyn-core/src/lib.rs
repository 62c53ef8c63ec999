pub mod aliasing;
pub mod dynamics;
#[cfg(test)]
mod example_components;
pub mod framework;
pub mod ivp;
pub mod params;
pub mod simulate;
pub mod topology;

pub mod errors;

/// Floating point type used for every biological quantity.
pub type FloatValue = f64;
