//! CLI Commands

pub mod cases;
pub mod codegen;
pub mod run;
pub mod templates;
pub mod validate;
