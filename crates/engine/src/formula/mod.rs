// Formula parsing, evaluation and reference rewriting

pub mod eval;
pub mod parser;
pub mod refs;
