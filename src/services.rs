pub mod client_service;
pub mod invoice_service;
pub mod payment_service;
pub mod reminder_service;
pub mod report_service;
pub mod sync_service;
