extern crate serde;
extern crate serde_json;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate tracing;

pub mod compiler;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod identity;
pub mod layout;
pub mod logging;
pub mod materialize;
pub mod row;
pub mod schema;
pub mod templating;
pub mod theme;
pub mod tree;

mod utils;
