pub mod twitter;
pub mod wire;

pub use twitter::{TwitterSession, TwitterWeb};
