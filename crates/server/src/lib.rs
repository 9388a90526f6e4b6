//! Server adapter for the Stayfinder samples: bootstrap, HTTP surface, and
//! logging setup shared by the two binaries.

pub mod bootstrap;
pub mod health;
pub mod logging;
pub mod serve;
