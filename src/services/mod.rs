pub mod scheduler;

pub use scheduler::PlanScheduler;
