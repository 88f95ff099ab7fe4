// src/services.rs

pub mod catalog_service;
pub mod change_notifier;
pub mod dashboard_service;
pub mod lease_service;
pub(crate) mod snapshots;
pub mod stock_ledger;
