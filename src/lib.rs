//! Biomass dynamics of species in trophic and multiplex ecological networks.
//!
//! Models are assembled from blueprints with [`Model`], simulated with
//! [`Model::simulate`] and analysed with the [`measures`].
//!
//! ```no_run
//! use endyn::blueprints::Foodweb;
//! use endyn::measures::Window;
//! use endyn::simulate::{InitialState, SimulationConfig};
//! use endyn::Model;
//! use ndarray::array;
//!
//! let foodweb = Foodweb::matrix(array![[false, false], [true, false]]);
//! let model = Model::default_for(foodweb)?;
//! let solution = model.simulate(&InitialState::new(0.5), &SimulationConfig::new(500.0))?;
//! let window = Window::last(&solution, 10)?;
//! println!("persistence: {}", window.persistence(1e-5));
//! # Ok::<(), endyn::errors::EndynError>(())
//! ```

pub mod measures;

pub use endyn_components::{args, blueprints, ids, registry, Model};
pub use endyn_core::{aliasing, errors, framework, ivp, params, simulate, topology, FloatValue};
