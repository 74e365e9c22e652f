pub mod payment;
pub mod session;
pub mod usage;

pub use payment::{PaymentRecord, PaymentStatus};
pub use session::{AccessSession, SessionStatus};
pub use usage::{UsageRecord, UsageStats};
