//! Disposable backing services for integration tests.

pub mod error;
pub mod mysql;
pub mod rabbitmq;

pub use error::{Result, TestInfraError};
