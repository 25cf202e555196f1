pub mod account_service;
pub mod audit_service;
pub mod background_jobs;
pub mod complaint_service;
pub mod error;
pub mod lifecycle;
pub mod notification_service;
pub mod storage_service;
