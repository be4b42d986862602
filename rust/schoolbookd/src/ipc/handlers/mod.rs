pub mod backup;
pub mod billing;
pub mod core;
pub mod finance;
pub mod insights;
pub mod reports;
pub mod school;
pub mod store;
