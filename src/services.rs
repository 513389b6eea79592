// src/services.rs

pub mod day_resolver;
pub mod deduction_service;
pub mod job_service;
pub mod monthly_service;
pub mod penalty_service;
pub mod workflow_service;
