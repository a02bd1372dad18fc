pub mod connection;
pub mod dao;
pub mod entities;
pub mod providers;
pub mod unit_of_work;

pub use unit_of_work::UnitOfWork;
