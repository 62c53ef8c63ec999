//! Blueprints of ecological network models.
//!
//! A [`Model`] is built by adding blueprints from the [`blueprints`] catalogue, each providing
//! one component (species, food web, rates, functional response...). The [`registry`]
//! declares which components require or exclude each other and which properties they expose.
//!
//! ```no_run
//! use endyn_components::blueprints::Foodweb;
//! use endyn_components::Model;
//! use endyn_core::simulate::{InitialState, SimulationConfig};
//! use ndarray::array;
//!
//! let model = Model::default_for(Foodweb::matrix(array![[false, false], [true, false]]))?;
//! let solution = model.simulate(&InitialState::new(0.5), &SimulationConfig::new(100.0))?;
//! println!("{:?}", solution.final_biomass());
//! # Ok::<(), endyn_core::errors::EndynError>(())
//! ```

pub mod args;
pub mod blueprints;
pub mod ids;
pub mod model;
pub mod registry;

pub use model::Model;
pub use registry::registry;
