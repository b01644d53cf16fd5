pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod invoice_repo;
pub use invoice_repo::InvoiceRepository;
pub mod payment_repo;
pub use payment_repo::PaymentRepository;
pub mod integration_repo;
pub use integration_repo::IntegrationRepository;
