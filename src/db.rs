// src/db.rs

pub mod hr_repo;
pub use hr_repo::HrRepository;
pub mod punch_repo;
pub use punch_repo::PunchRepository;
pub mod attendance_repo;
pub use attendance_repo::AttendanceRepository;
pub mod deduction_repo;
pub use deduction_repo::DeductionRepository;
pub mod transaction_repo;
pub use transaction_repo::TransactionRepository;
pub mod finance_repo;
pub use finance_repo::FinanceRepository;
pub mod job_repo;
pub use job_repo::JobRepository;
