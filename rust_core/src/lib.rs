pub mod autodiff;
pub mod chunk;
pub mod config;
pub mod distributions;
pub mod dual;
pub mod error;
pub mod gradient;
pub mod hmc;
pub mod model;
pub mod sampler;
pub mod scalar;
pub mod selection;
pub mod store;

pub use autodiff::{gradient, log_density, value_and_gradient};
pub use config::GradientConfig;
pub use error::{Error, Result};
pub use gradient::{verify_gradient, GradientMap, ReportLevel};
pub use model::Model;
pub use scalar::Scalar;
pub use selection::Selection;
pub use store::{GroupId, VarKey, VarStore};
