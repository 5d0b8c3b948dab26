#[cfg(feature = "camera")]
pub mod app;
pub mod capture;
#[cfg(feature = "camera")]
pub mod cv;
pub mod error;
pub mod face;
pub mod image;
pub mod model;
pub mod overlay;
pub mod processor;
pub mod result;
pub mod setting;
pub mod tracing;

pub use error::Error;
pub use result::Result;
