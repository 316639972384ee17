/// In-memory graph store and its mutation algorithms.
pub mod store;

/// Read-only query operations over the code graph.
pub mod queries;

pub use queries::{GraphQueryManager, SymbolRef};
pub use store::CodeGraph;
