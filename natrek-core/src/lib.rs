pub mod booking;
pub mod dates;
pub mod error;
pub mod event;
pub mod payment;
pub mod pricing;
pub mod repository;
pub mod tour;

pub use error::{CoreError, CoreResult};
