pub mod alphabet;
pub mod bitvec;
pub mod cache;
pub mod dot;
pub mod error;
pub mod index;
pub mod knfa;
pub mod path;
pub mod query;
pub mod thompson;
pub mod verify;
