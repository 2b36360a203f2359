// src/services/store_service.rs
use async_trait::async_trait;
use redis::Client;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tokio::sync::RwLock;
use tracing;

use crate::errors::{GrievanceError, GrievanceResult};

// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

// Store key strategies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Simple(String),
    Composite(Vec<String>),
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Simple(key) => write!(f, "{}", key),
            StoreKey::Composite(parts) => write!(f, "{}", parts.join(":")),
        }
    }
}

fn composite(parts: &[&str]) -> StoreKey {
    StoreKey::Composite(parts.iter().map(|p| p.to_string()).collect())
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Operation error: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrent modification of {0}")]
    Conflict(String),
}

impl From<StoreError> for GrievanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConnectionError(msg) => GrievanceError::StoreConnection(msg),
            StoreError::OperationError(msg) => GrievanceError::StoreQuery(msg),
            StoreError::SerializationError(msg) => GrievanceError::StoreSerialization(msg),
            StoreError::Conflict(key) => GrievanceError::WriteConflict(format!(
                "{} was modified by another request, retry the operation",
                key
            )),
        }
    }
}

/// A decoded value together with the exact stored text it came from.
/// Committing with its guard only succeeds if nobody wrote the key since.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub value: T,
    raw: String,
    key: StoreKey,
}

impl<T> Snapshot<T> {
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    pub fn guard(&self) -> Guard {
        Guard {
            key: self.key.to_string(),
            expected: Some(self.raw.clone()),
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Compare-and-swap precondition on a value key.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    key: String,
    expected: Option<String>, // None: the key must not exist
}

impl Guard {
    pub fn absent(key: &StoreKey) -> Self {
        Self {
            key: key.to_string(),
            expected: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { key: String, value: String },
    Delete { key: String },
    SAdd { key: String, member: String },
    SRem { key: String, member: String },
    RPush { key: String, value: String },
}

impl WriteOp {
    fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. }
            | WriteOp::Delete { key }
            | WriteOp::SAdd { key, .. }
            | WriteOp::SRem { key, .. }
            | WriteOp::RPush { key, .. } => key,
        }
    }
}

/// Writes applied all-or-nothing, after every guard has been checked.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    guards: Vec<Guard>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&mut self, key: &StoreKey, value: &T) -> Result<&mut Self, StoreError> {
        let value = serde_json::to_string(value)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        self.ops.push(WriteOp::Set {
            key: key.to_string(),
            value,
        });
        Ok(self)
    }

    pub fn delete(&mut self, key: &StoreKey) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.to_string() });
        self
    }

    pub fn sadd(&mut self, key: &StoreKey, member: &str) -> &mut Self {
        self.ops.push(WriteOp::SAdd {
            key: key.to_string(),
            member: member.to_string(),
        });
        self
    }

    pub fn srem(&mut self, key: &StoreKey, member: &str) -> &mut Self {
        self.ops.push(WriteOp::SRem {
            key: key.to_string(),
            member: member.to_string(),
        });
        self
    }

    /// Append to a list. Lists are never rewritten, only pushed to or dropped whole.
    pub fn push<T: Serialize>(&mut self, key: &StoreKey, entry: &T) -> Result<&mut Self, StoreError> {
        let value = serde_json::to_string(entry)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        self.ops.push(WriteOp::RPush {
            key: key.to_string(),
            value,
        });
        Ok(self)
    }

    pub fn guard(&mut self, guard: Guard) -> &mut Self {
        if !self.guards.contains(&guard) {
            self.guards.push(guard);
        }
        self
    }

    pub fn expect_absent(&mut self, key: &StoreKey) -> &mut Self {
        self.guard(Guard::absent(key))
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

#[async_trait]
pub trait StoreOperations: Send + Sync {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError>;
    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError>;
    /// Inclusive range with negative indexes counted from the tail.
    async fn lrange(&self, key: &StoreKey, start: isize, stop: isize) -> Result<Vec<String>, StoreError>;
    async fn llen(&self, key: &StoreKey) -> Result<usize, StoreError>;
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

// Enum to wrap different store implementations
pub enum Store {
    Redis(RedisStore),
    Memory(MemoryStore),
}

#[async_trait]
impl StoreOperations for Store {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError> {
        match self {
            Store::Redis(store) => store.get_raw(key).await,
            Store::Memory(store) => store.get_raw(key).await,
        }
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        match self {
            Store::Redis(store) => store.smembers(key).await,
            Store::Memory(store) => store.smembers(key).await,
        }
    }

    async fn lrange(&self, key: &StoreKey, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        match self {
            Store::Redis(store) => store.lrange(key, start, stop).await,
            Store::Memory(store) => store.lrange(key, start, stop).await,
        }
    }

    async fn llen(&self, key: &StoreKey) -> Result<usize, StoreError> {
        match self {
            Store::Redis(store) => store.llen(key).await,
            Store::Memory(store) => store.llen(key).await,
        }
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.commit(batch).await,
            Store::Memory(store) => store.commit(batch).await,
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.ping().await,
            Store::Memory(store) => store.ping().await,
        }
    }
}

// Redis-based store implementation
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    pub async fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis_url.clone())
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let instance = Self { client };
        instance.ping().await?;
        Ok(instance)
    }

    // WATCH state is per connection, so every call gets its own.
    async fn get_connection(&self) -> Result<redis::aio::Connection, StoreError> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }
}

fn operation_error(e: redis::RedisError) -> StoreError {
    StoreError::OperationError(e.to_string())
}

#[async_trait]
impl StoreOperations for RedisStore {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("GET")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await
            .map_err(operation_error)
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("SMEMBERS")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await
            .map_err(operation_error)
    }

    async fn lrange(&self, key: &StoreKey, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("LRANGE")
            .arg(key.to_string())
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await
            .map_err(operation_error)
    }

    async fn llen(&self, key: &StoreKey) -> Result<usize, StoreError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("LLEN")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await
            .map_err(operation_error)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.ops.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_connection().await?;

        if !batch.guards.is_empty() {
            let watched: Vec<&str> = batch.guards.iter().map(|g| g.key.as_str()).collect();
            let _: () = redis::cmd("WATCH")
                .arg(&watched)
                .query_async(&mut conn)
                .await
                .map_err(operation_error)?;

            for guard in &batch.guards {
                let current: Option<String> = redis::cmd("GET")
                    .arg(&guard.key)
                    .query_async(&mut conn)
                    .await
                    .map_err(operation_error)?;

                if current != guard.expected {
                    let _: () = redis::cmd("UNWATCH")
                        .query_async(&mut conn)
                        .await
                        .map_err(operation_error)?;
                    return Err(StoreError::Conflict(guard.key.clone()));
                }
            }
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &batch.ops {
            match op {
                WriteOp::Set { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value).ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
                WriteOp::SAdd { key, member } => {
                    pipe.cmd("SADD").arg(key).arg(member).ignore();
                }
                WriteOp::SRem { key, member } => {
                    pipe.cmd("SREM").arg(key).arg(member).ignore();
                }
                WriteOp::RPush { key, value } => {
                    pipe.cmd("RPUSH").arg(key).arg(value).ignore();
                }
            }
        }

        // EXEC replies nil when a watched key changed after our check
        let applied: Option<()> = pipe.query_async(&mut conn).await.map_err(operation_error)?;
        match applied {
            Some(()) => Ok(()),
            None => Err(StoreError::Conflict(
                batch
                    .guards
                    .first()
                    .map(|g| g.key.clone())
                    .unwrap_or_else(|| "transaction".to_string()),
            )),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Value(String),
    Set(BTreeSet<String>),
    List(Vec<String>),
}

// Memory store for development/testing
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::OperationError(format!("WRONGTYPE operation against key {}", key))
}

fn list_window(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl StoreOperations for MemoryStore {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        let data = self.data.read().await;
        match data.get(&key) {
            Some(Slot::Value(raw)) => Ok(Some(raw.clone())),
            Some(_) => Err(wrong_type(&key)),
            None => Ok(None),
        }
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        let key = key.to_string();
        let data = self.data.read().await;
        match data.get(&key) {
            Some(Slot::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(&key)),
            None => Ok(Vec::new()),
        }
    }

    async fn lrange(&self, key: &StoreKey, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let key = key.to_string();
        let data = self.data.read().await;
        match data.get(&key) {
            Some(Slot::List(items)) => Ok(match list_window(items.len(), start, stop) {
                Some((from, to)) => items[from..=to].to_vec(),
                None => Vec::new(),
            }),
            Some(_) => Err(wrong_type(&key)),
            None => Ok(Vec::new()),
        }
    }

    async fn llen(&self, key: &StoreKey) -> Result<usize, StoreError> {
        let key = key.to_string();
        let data = self.data.read().await;
        match data.get(&key) {
            Some(Slot::List(items)) => Ok(items.len()),
            Some(_) => Err(wrong_type(&key)),
            None => Ok(0),
        }
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut data = self.data.write().await;

        for guard in &batch.guards {
            let current = match data.get(&guard.key) {
                Some(Slot::Value(raw)) => Some(raw),
                Some(_) => return Err(StoreError::Conflict(guard.key.clone())),
                None => None,
            };
            if current != guard.expected.as_ref() {
                return Err(StoreError::Conflict(guard.key.clone()));
            }
        }

        // Stage every touched key so a failing op leaves the map untouched
        let mut staged: HashMap<String, Option<Slot>> = HashMap::new();
        for op in batch.ops {
            let key = op.key().to_string();
            let entry = staged
                .entry(key.clone())
                .or_insert_with(|| data.get(&key).cloned());

            match op {
                WriteOp::Set { value, .. } => *entry = Some(Slot::Value(value)),
                WriteOp::Delete { .. } => *entry = None,
                WriteOp::SAdd { member, .. } => {
                    match entry.get_or_insert_with(|| Slot::Set(BTreeSet::new())) {
                        Slot::Set(members) => {
                            members.insert(member);
                        }
                        _ => return Err(wrong_type(&key)),
                    }
                }
                WriteOp::SRem { member, .. } => {
                    let now_empty = match entry.as_mut() {
                        Some(Slot::Set(members)) => {
                            members.remove(&member);
                            members.is_empty()
                        }
                        Some(_) => return Err(wrong_type(&key)),
                        None => false,
                    };
                    if now_empty {
                        *entry = None;
                    }
                }
                WriteOp::RPush { value, .. } => {
                    match entry.get_or_insert_with(|| Slot::List(Vec::new())) {
                        Slot::List(items) => items.push(value),
                        _ => return Err(wrong_type(&key)),
                    }
                }
            }
        }

        for (key, slot) in staged {
            match slot {
                Some(slot) => {
                    data.insert(key, slot);
                }
                None => {
                    data.remove(&key);
                }
            }
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// Store key generators for different resources
pub struct StoreKeys;

impl StoreKeys {
    // Complaint keys
    pub fn complaint(complaint_id: &str) -> StoreKey {
        composite(&["complaint", "id", complaint_id])
    }

    pub fn complaints_by_citizen(citizen_id: &str) -> StoreKey {
        composite(&["complaints", "citizen", citizen_id])
    }

    pub fn complaints_by_department(department: &str) -> StoreKey {
        composite(&["complaints", "department", &department.to_lowercase()])
    }

    pub fn complaints_all() -> StoreKey {
        StoreKey::Simple("complaints:all".to_string())
    }

    pub fn complaints_by_serviceman(serviceman_id: &str) -> StoreKey {
        composite(&["complaints", "serviceman", serviceman_id])
    }

    pub fn complaint_timeline(complaint_id: &str) -> StoreKey {
        composite(&["complaint", "timeline", complaint_id])
    }

    pub fn complaint_action_history(complaint_id: &str) -> StoreKey {
        composite(&["complaint", "actions", complaint_id])
    }

    // Report keys
    pub fn report(report_id: &str) -> StoreKey {
        composite(&["report", "id", report_id])
    }

    pub fn reports_by_serviceman(serviceman_id: &str) -> StoreKey {
        composite(&["reports", "serviceman", serviceman_id])
    }

    // Account keys
    pub fn citizen(citizen_id: &str) -> StoreKey {
        composite(&["citizen", "id", citizen_id])
    }

    pub fn citizens_all() -> StoreKey {
        StoreKey::Simple("citizens:all".to_string())
    }

    pub fn officer(officer_id: &str) -> StoreKey {
        composite(&["officer", "id", officer_id])
    }

    pub fn serviceman(serviceman_id: &str) -> StoreKey {
        composite(&["serviceman", "id", serviceman_id])
    }

    pub fn admin(admin_id: &str) -> StoreKey {
        composite(&["admin", "id", admin_id])
    }

    pub fn account_email(email: &str) -> StoreKey {
        composite(&["account", "email", &email.trim().to_lowercase()])
    }

    /// Holds the id of the level-1 officer receiving complaints for this pair.
    pub fn officer_router(department: &str, district: &str) -> StoreKey {
        composite(&[
            "officer",
            "router",
            &department.to_lowercase(),
            &district.to_lowercase(),
        ])
    }

    pub fn officers_by_route(department: &str, district: &str) -> StoreKey {
        composite(&[
            "officers",
            "route",
            &department.to_lowercase(),
            &district.to_lowercase(),
        ])
    }

    pub fn officers_all() -> StoreKey {
        StoreKey::Simple("officers:all".to_string())
    }

    pub fn servicemen_by_department(department: &str) -> StoreKey {
        composite(&["servicemen", "department", &department.to_lowercase()])
    }

    pub fn session(token: &str) -> StoreKey {
        composite(&["session", token])
    }

    // Catalog keys
    pub fn department(department_id: &str) -> StoreKey {
        composite(&["department", "id", department_id])
    }

    pub fn department_by_name(name: &str) -> StoreKey {
        composite(&["department", "name", &name.trim().to_lowercase()])
    }

    pub fn departments_all() -> StoreKey {
        StoreKey::Simple("departments:all".to_string())
    }

    pub fn service(service_id: &str) -> StoreKey {
        composite(&["service", "id", service_id])
    }

    pub fn service_by_name(department_id: &str, name: &str) -> StoreKey {
        composite(&["service", "name", department_id, &name.trim().to_lowercase()])
    }

    pub fn services_by_department(department_id: &str) -> StoreKey {
        composite(&["services", "department", department_id])
    }

    // Rating keys
    pub fn officer_ratings(officer_id: &str) -> StoreKey {
        composite(&["ratings", "officer", officer_id])
    }
}

// Store service wrapper
pub struct StoreService {
    store: Store,
}

impl StoreService {
    pub async fn new_redis(config: StoreConfig) -> Result<Self, StoreError> {
        tracing::info!("Connecting to redis store at {}", config.redis_url);
        Ok(Self {
            store: Store::Redis(RedisStore::new(config).await?),
        })
    }

    pub fn memory() -> Self {
        Self {
            store: Store::Memory(MemoryStore::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.store {
            Store::Redis(_) => "redis",
            Store::Memory(_) => "memory",
        }
    }

    /// Read a value and remember what it looked like, for a guarded commit.
    pub async fn load<T: DeserializeOwned>(&self, key: &StoreKey) -> GrievanceResult<Option<Snapshot<T>>> {
        let Some(raw) = self.store.get_raw(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw)
            .map_err(|e| StoreError::SerializationError(format!("{}: {}", key, e)))?;
        Ok(Some(Snapshot {
            value,
            raw,
            key: key.clone(),
        }))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &StoreKey) -> GrievanceResult<Option<T>> {
        Ok(self.load(key).await?.map(Snapshot::into_inner))
    }

    pub async fn require<T: DeserializeOwned>(
        &self,
        key: &StoreKey,
        missing: impl FnOnce() -> GrievanceError + Send,
    ) -> GrievanceResult<Snapshot<T>> {
        self.load(key).await?.ok_or_else(missing)
    }

    /// Decode every id in a set through `key_for`, skipping dangling members.
    pub async fn collect<T: DeserializeOwned>(
        &self,
        index: &StoreKey,
        key_for: impl Fn(&str) -> StoreKey + Send,
    ) -> GrievanceResult<Vec<T>> {
        let ids = self.members(index).await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&key_for(&id)).await? {
                Some(item) => items.push(item),
                None => tracing::warn!("Index {} references missing entry {}", index, id),
            }
        }
        Ok(items)
    }

    /// Set members in a stable order.
    pub async fn members(&self, key: &StoreKey) -> GrievanceResult<Vec<String>> {
        let mut members = self.store.smembers(key).await?;
        members.sort();
        Ok(members)
    }

    /// One page of a list, oldest first. Pages start at 1.
    pub async fn page<T: DeserializeOwned>(
        &self,
        key: &StoreKey,
        page: usize,
        per_page: usize,
    ) -> GrievanceResult<(Vec<T>, usize)> {
        let total = self.store.llen(key).await?;
        if per_page == 0 {
            return Ok((Vec::new(), total));
        }
        let start = page.saturating_sub(1).saturating_mul(per_page);
        if start >= total {
            return Ok((Vec::new(), total));
        }
        let stop = start + per_page - 1;
        let raw = self
            .store
            .lrange(key, start as isize, stop as isize)
            .await?;
        Ok((decode_all(key, raw)?, total))
    }

    /// The last `count` entries of a list, oldest first.
    pub async fn latest<T: DeserializeOwned>(&self, key: &StoreKey, count: usize) -> GrievanceResult<Vec<T>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let raw = self.store.lrange(key, -(count as isize), -1).await?;
        decode_all(key, raw)
    }

    pub async fn list_len(&self, key: &StoreKey) -> GrievanceResult<usize> {
        Ok(self.store.llen(key).await?)
    }

    pub async fn commit(&self, batch: WriteBatch) -> GrievanceResult<()> {
        tracing::debug!(
            "Committing {} writes under {} guards",
            batch.len(),
            batch.guards.len()
        );
        self.store.commit(batch).await.map_err(|e| {
            if let StoreError::Conflict(key) = &e {
                tracing::warn!("Guarded commit rejected, {} changed concurrently", key);
            }
            e.into()
        })
    }

    pub async fn health_check(&self) -> GrievanceResult<()> {
        Ok(self.store.ping().await?)
    }
}

fn decode_all<T: DeserializeOwned>(key: &StoreKey, raw: Vec<String>) -> GrievanceResult<Vec<T>> {
    raw.iter()
        .map(|item| {
            serde_json::from_str(item).map_err(|e| {
                GrievanceError::from(StoreError::SerializationError(format!("{}: {}", key, e)))
            })
        })
        .collect()
}
