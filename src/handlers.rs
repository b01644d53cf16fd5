pub mod clients;
pub mod integrations;
pub mod invoices;
pub mod payments;
pub mod reports;
