//! Java source printing and target package validation

mod java;
pub mod scoping;

pub use java::render_java;
pub use scoping::{JavaPackage, NamespaceError};

pub(crate) use java::expr as java_expr;
#[cfg(test)]
pub(crate) use java::marker_text;
