// src/handlers.rs

pub mod categories;
pub mod dashboard;
pub mod items;
pub mod leases;
pub mod realtime;
