#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod config;
pub mod data;
pub mod gate;
pub mod label;
pub mod model;
pub mod naive_bayes;
pub mod ranges;
pub mod record;
pub mod report;
pub mod validate;
