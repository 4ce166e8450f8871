//! Runtime type definitions

mod value;

pub use value::Value;
