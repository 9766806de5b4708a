//! Support code for the `tinycert` command line tool

pub mod settings;
