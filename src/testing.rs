// 测试用的内存实现，支持故障注入和调用计数

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use crate::cache::CacheLayer;
use crate::database::{NewUser, User, UserStore};
use crate::error::{CacheError, StoreError};
use crate::utils::hash_password;

pub(crate) fn sample_user(id: u64, name: &str, email: &str) -> User {
    let now = Utc::now();
    User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        password_hash: "$2b$04$invalidinvalidinvalidinvalidinvalidinvalidinvalidinv".to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn user_with_password(id: u64, email: &str, password: &str) -> User {
    let mut user = sample_user(id, "Ann", email);
    user.password_hash = hash_password(password, 4).expect("hash");
    user
}

#[derive(Default)]
pub(crate) struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant, Duration)>>,
    pub failing: AtomicBool,
    pub stalled: AtomicBool,
    pub sets: AtomicUsize,
}

impl MemoryCache {
    pub fn put_raw(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            (value, Instant::now(), Duration::from_secs(3600)),
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, _, ttl)| *ttl)
    }

    async fn check(&self) -> Result<(), CacheError> {
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.check().await?;
        let mut entries = self.entries.lock().unwrap();
        let expired = match entries.get(key) {
            Some((_, stored_at, ttl)) => stored_at.elapsed() >= *ttl,
            None => return Ok(None),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check().await?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, Instant::now(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check().await?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    users: Mutex<Vec<User>>,
    next_id: AtomicU64,
    pub failing: AtomicBool,
    pub finds: AtomicUsize,
    pub creates: AtomicUsize,
}

impl MemoryStore {
    pub fn with_users(users: Vec<User>) -> Self {
        let next_id = users.iter().map(|u| u.id).max().unwrap_or(0);
        Self {
            users: Mutex::new(users),
            next_id: AtomicU64::new(next_id),
            ..Default::default()
        }
    }

    pub fn rename(&self, id: u64, name: &str) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.name = name.to_string();
            user.updated_at = Utc::now();
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict);
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}
