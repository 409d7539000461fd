pub mod engine;
pub mod hasher;
pub mod payload;
pub mod scanner;
