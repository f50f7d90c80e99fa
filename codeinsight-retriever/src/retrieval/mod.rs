pub mod analyzer;
pub mod generation;
pub mod retrieval_engine;
pub mod vector_index;
