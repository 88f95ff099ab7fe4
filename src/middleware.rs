// src/middleware.rs

pub mod user;
