//! Parsers for the two page kinds of an llvm-cov HTML report.
pub mod html;
pub mod index;
pub mod source;
