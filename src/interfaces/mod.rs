//! Driving adapters: the command script reader, the dispatcher that runs commands against the
//! services, and the JSON-lines outcome writer.

pub mod csv;
pub mod outcome;
pub mod runner;
