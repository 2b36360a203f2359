// src/models/mod.rs
pub mod account;
pub mod complaint;
pub mod department;
pub mod rating;
pub mod report;

pub use account::*;
pub use complaint::*;
pub use department::*;
pub use rating::*;
pub use report::*;
