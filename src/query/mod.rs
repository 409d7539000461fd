pub mod albums;
pub mod retrieval;
