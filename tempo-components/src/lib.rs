pub mod components;
pub mod constants;
