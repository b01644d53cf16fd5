pub mod client;
pub mod integration;
pub mod invoice;
pub mod payment;
pub mod report;
