mod semantic_visitor;
mod symbol_table;

pub use semantic_visitor::*;
pub use symbol_table::*;
