pub mod catalog;
pub mod gateway;
pub mod resources;
