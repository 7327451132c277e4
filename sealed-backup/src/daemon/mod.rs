//! Long-running mode: periodic backups until a shutdown signal arrives.

pub mod scheduler;
pub mod shutdown;

pub use scheduler::Scheduler;
pub use shutdown::ShutdownCoordinator;
