//! # Cinder values and operators
//!
//! The value model shared by the compiler and the VM: the tagged [`value::Value`]
//! sum, its [`types::ValueType`] tag with the operator typing rules, and the
//! [`operator::Operator`] symbols the runtime reducer works on.

pub mod operator;
pub mod types;
pub mod value;
