pub mod cascade;
pub mod keys;
pub mod validity;
