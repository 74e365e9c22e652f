pub mod chat;
pub mod grantor;
pub mod metrics;
pub mod providers;
pub mod rate_limit;
pub mod router;
pub mod store;
pub mod tokens;

pub use chat::{ChatOutcome, ChatService};
pub use grantor::{GrantOutcome, SessionGrantor};
pub use providers::{ChatProvider, ChatReply, ProviderSet};
pub use rate_limit::{FixedWindowLimiter, RateCounter};
pub use router::{ModelRouter, Provider, RouteChoice, RouteOverride};
pub use store::{CommitOutcome, MongoSessionStore, PaymentInsert, SessionStore};
pub use tokens::estimate_tokens;
