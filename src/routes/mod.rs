mod entry;
pub mod health;
pub mod tools;

pub use entry::{app, router};
