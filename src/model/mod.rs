//! Source API data model
pub mod octopus;
