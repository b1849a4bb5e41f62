pub mod error;
pub mod executions;
pub mod health;
pub mod tasks;
