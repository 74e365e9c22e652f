//! Session, usage, and payment persistence.
//!
//! The session row is one of the two pieces of shared mutable state in the
//! gateway (the other is the rate counter). Everything that mutates it goes
//! through a single conditional update; plain read-modify-write sequences
//! are not exposed by this interface.

use crate::models::{AccessSession, PaymentRecord, SessionStatus, UsageRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mongodb::{
    bson::doc,
    options::{
        FindOneAndUpdateOptions, FindOneOptions, FindOptions, IndexOptions, ReturnDocument,
        UpdateModifications,
    },
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Result of a conditional token commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The increment fit the budget; `new_total` is the post-commit
    /// `tokens_used` as stored.
    Committed { new_total: i64 },
    /// The increment would have exceeded `token_limit` at commit time.
    Exhausted,
}

/// Result of recording a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentInsert {
    Recorded,
    /// A payment with the same external transaction id already exists;
    /// the caller must not grant again.
    Duplicate,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Latest-expiring live session for the caller, if any.
    async fn find_active_session(
        &self,
        caller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError>;

    async fn insert_session(&self, session: &AccessSession) -> Result<(), AppError>;

    /// Atomically push the live session's `ends_at` out by `grant`,
    /// stacking on the current expiry. Returns the updated session, or
    /// `None` when the caller has no live session.
    async fn extend_session(
        &self,
        caller_id: &str,
        grant: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError>;

    /// Flip `active` rows whose `ends_at` has passed to `expired`.
    async fn expire_stale_sessions(&self, caller_id: &str, now: DateTime<Utc>)
        -> Result<(), AppError>;

    /// Atomic conditional commit: add `tokens` to `tokens_used` only if the
    /// result stays within `token_limit`, evaluated against the currently
    /// stored value.
    async fn commit_tokens(&self, session_id: &str, tokens: i64) -> Result<CommitOutcome, AppError>;

    /// Insert a payment record; duplicates (by transaction id) are reported,
    /// not errors.
    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<PaymentInsert, AppError>;

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), AppError>;

    async fn list_usage(&self, caller_id: &str, limit: i64) -> Result<Vec<UsageRecord>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct MongoSessionStore {
    client: MongoClient,
    db: Database,
}

impl MongoSessionStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for gateway-service");

        // Sessions: unique id plus the latest-active lookup path
        let session_id_index = IndexModel::builder()
            .keys(doc! { "session_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("session_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let caller_active_index = IndexModel::builder()
            .keys(doc! { "caller_id": 1, "status": 1, "ends_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("caller_active_idx".to_string())
                    .build(),
            )
            .build();

        self.sessions()
            .create_indexes([session_id_index, caller_active_index], None)
            .await?;

        // Usage: caller timeline and per-session lookups
        let caller_time_index = IndexModel::builder()
            .keys(doc! { "caller_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("caller_time_idx".to_string())
                    .build(),
            )
            .build();

        let usage_session_index = IndexModel::builder()
            .keys(doc! { "session_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("usage_session_idx".to_string())
                    .build(),
            )
            .build();

        self.usage()
            .create_indexes([caller_time_index, usage_session_index], None)
            .await?;

        // Payments: the idempotency guard. A duplicate webhook delivery hits
        // this unique index and never reaches the session grantor.
        let txn_index = IndexModel::builder()
            .keys(doc! { "transaction_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("transaction_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.payments().create_index(txn_index, None).await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    fn sessions(&self) -> Collection<AccessSession> {
        self.db.collection("sessions")
    }

    fn usage(&self) -> Collection<UsageRecord> {
        self.db.collection("usage")
    }

    fn payments(&self) -> Collection<PaymentRecord> {
        self.db.collection("payments")
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn find_active_session(
        &self,
        caller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError> {
        let filter = doc! {
            "caller_id": caller_id,
            "status": "active",
            "ends_at": { "$gt": now.timestamp_millis() }
        };
        let options = FindOneOptions::builder()
            .sort(doc! { "ends_at": -1 })
            .build();

        Ok(self.sessions().find_one(filter, options).await?)
    }

    async fn insert_session(&self, session: &AccessSession) -> Result<(), AppError> {
        self.sessions().insert_one(session, None).await?;
        Ok(())
    }

    async fn extend_session(
        &self,
        caller_id: &str,
        grant: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError> {
        let filter = doc! {
            "caller_id": caller_id,
            "status": "active",
            "ends_at": { "$gt": now.timestamp_millis() }
        };
        // Pipeline update so the new expiry stacks on the *stored* ends_at,
        // not on a value read earlier.
        let update = UpdateModifications::Pipeline(vec![doc! {
            "$set": {
                "ends_at": { "$add": ["$ends_at", grant.num_milliseconds()] },
                "updated_at": now.timestamp_millis()
            }
        }]);
        let options = FindOneAndUpdateOptions::builder()
            .sort(doc! { "ends_at": -1 })
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .sessions()
            .find_one_and_update(filter, update, options)
            .await?)
    }

    async fn expire_stale_sessions(
        &self,
        caller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.sessions()
            .update_many(
                doc! {
                    "caller_id": caller_id,
                    "status": "active",
                    "ends_at": { "$lte": now.timestamp_millis() }
                },
                doc! { "$set": { "status": "expired", "updated_at": now.timestamp_millis() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn commit_tokens(&self, session_id: &str, tokens: i64) -> Result<CommitOutcome, AppError> {
        // Single conditional update: the quota check and the increment see
        // the same stored value, so concurrent commits for one session can
        // never overrun the budget.
        let filter = doc! {
            "session_id": session_id,
            "$expr": {
                "$lte": [ { "$add": ["$tokens_used", tokens] }, "$token_limit" ]
            }
        };
        let update = doc! {
            "$inc": { "tokens_used": tokens },
            "$set": { "updated_at": Utc::now().timestamp_millis() }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        match self
            .sessions()
            .find_one_and_update(filter, update, options)
            .await?
        {
            Some(session) => Ok(CommitOutcome::Committed {
                new_total: session.tokens_used,
            }),
            None => Ok(CommitOutcome::Exhausted),
        }
    }

    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<PaymentInsert, AppError> {
        match self.payments().insert_one(payment, None).await {
            Ok(_) => Ok(PaymentInsert::Recorded),
            Err(e) if is_duplicate_key(&e) => Ok(PaymentInsert::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), AppError> {
        self.usage().insert_one(record, None).await?;
        Ok(())
    }

    async fn list_usage(&self, caller_id: &str, limit: i64) -> Result<Vec<UsageRecord>, AppError> {
        use futures::TryStreamExt;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();
        let cursor = self
            .usage()
            .find(doc! { "caller_id": caller_id }, options)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }
}

/// In-memory store for tests. The mutex plays the role of the database's
/// document-level atomicity: each conditional update checks and mutates
/// under one lock acquisition, preserving the production semantics.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, AccessSession>>,
    payments: Mutex<HashMap<String, PaymentRecord>>,
    usage: Mutex<Vec<UsageRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct session lookup for test assertions.
    pub fn session(&self, session_id: &str) -> Option<AccessSession> {
        self.sessions
            .lock()
            .expect("sessions lock poisoned")
            .get(session_id)
            .cloned()
    }

    /// Recorded usage snapshot for test assertions.
    pub fn usage_snapshot(&self) -> Vec<UsageRecord> {
        self.usage.lock().expect("usage lock poisoned").clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_active_session(
        &self,
        caller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError> {
        let sessions = self.sessions.lock().expect("sessions lock poisoned");
        Ok(sessions
            .values()
            .filter(|s| s.caller_id == caller_id && s.is_live(now))
            .max_by_key(|s| s.ends_at)
            .cloned())
    }

    async fn insert_session(&self, session: &AccessSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn extend_session(
        &self,
        caller_id: &str,
        grant: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        let live = sessions
            .values_mut()
            .filter(|s| s.caller_id == caller_id && s.is_live(now))
            .max_by_key(|s| s.ends_at);

        Ok(live.map(|s| {
            s.ends_at = s.ends_at + grant;
            s.updated_at = now;
            s.clone()
        }))
    }

    async fn expire_stale_sessions(
        &self,
        caller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        for s in sessions
            .values_mut()
            .filter(|s| s.caller_id == caller_id && s.status == SessionStatus::Active && s.ends_at <= now)
        {
            s.status = SessionStatus::Expired;
            s.updated_at = now;
        }
        Ok(())
    }

    async fn commit_tokens(&self, session_id: &str, tokens: i64) -> Result<CommitOutcome, AppError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        match sessions.get_mut(session_id) {
            Some(s) if s.tokens_used + tokens <= s.token_limit => {
                s.tokens_used += tokens;
                s.updated_at = Utc::now();
                Ok(CommitOutcome::Committed {
                    new_total: s.tokens_used,
                })
            }
            _ => Ok(CommitOutcome::Exhausted),
        }
    }

    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<PaymentInsert, AppError> {
        let mut payments = self.payments.lock().expect("payments lock poisoned");
        if payments.contains_key(&payment.transaction_id) {
            return Ok(PaymentInsert::Duplicate);
        }
        payments.insert(payment.transaction_id.clone(), payment.clone());
        Ok(PaymentInsert::Recorded)
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), AppError> {
        let mut usage = self.usage.lock().expect("usage lock poisoned");
        usage.push(record.clone());
        Ok(())
    }

    async fn list_usage(&self, caller_id: &str, limit: i64) -> Result<Vec<UsageRecord>, AppError> {
        let usage = self.usage.lock().expect("usage lock poisoned");
        let mut records: Vec<UsageRecord> = usage
            .iter()
            .filter(|r| r.caller_id == caller_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
