// src/models.rs

pub mod dashboard;
pub mod events;
pub mod inventory;
pub mod lease;
pub mod user;
