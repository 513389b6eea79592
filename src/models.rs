// src/models.rs

pub mod attendance;
pub mod deduction;
pub mod hr;
pub mod job;
pub mod transaction;
