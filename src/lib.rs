extern crate clap;
extern crate indexmap;
extern crate mlua;
extern crate thiserror;

pub mod driver;
pub mod vm;
