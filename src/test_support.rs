//! In-memory doubles for the repository and mail seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use crate::api::email::{EmailMessage, EmailSender};
use crate::members::{Member, MemberRepo};
use crate::storage::StoreError;
use crate::tokens::{TokenRecord, TokenRepo, TokenScope};

#[derive(Default)]
struct Inner {
    members: Vec<Member>,
    tokens: Vec<TokenRecord>,
    next_id: i64,
}

/// Members and tokens kept in a mutex; clones share state.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// Make every following call fail with a database error.
    pub(crate) fn fail_with_storage_error(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn tokens(&self) -> Vec<TokenRecord> {
        self.lock().tokens.clone()
    }

    /// Bump a member's version behind the caller's back.
    pub(crate) fn touch(&self, id: i64) {
        if let Some(member) = self.lock().members.iter_mut().find(|m| m.id == id) {
            member.version += 1;
        }
    }
}

#[async_trait]
impl MemberRepo for MemoryStore {
    async fn insert(&self, member: &mut Member) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.lock();
        if inner.members.iter().any(|m| m.email == member.email) {
            return Err(StoreError::DuplicateEmail);
        }
        inner.next_id += 1;
        member.id = inner.next_id;
        member.version = 1;
        member.created_at = Utc::now();
        inner.members.push(member.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Member, StoreError> {
        self.check()?;
        self.lock()
            .members
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<Member, StoreError> {
        self.check()?;
        let email = crate::members::normalize_email(email);
        self.lock()
            .members
            .iter()
            .find(|m| m.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, member: &mut Member) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.lock();
        if inner
            .members
            .iter()
            .any(|m| m.id != member.id && m.email == member.email)
        {
            return Err(StoreError::DuplicateEmail);
        }
        let stored = inner
            .members
            .iter_mut()
            .find(|m| m.id == member.id && m.version == member.version)
            .ok_or(StoreError::VersionConflict)?;
        member.version += 1;
        *stored = member.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.lock();
        let before = inner.members.len();
        inner.members.retain(|m| m.id != id);
        if inner.members.len() == before {
            return Err(StoreError::NotFound);
        }
        inner.tokens.retain(|t| t.member_id != id);
        Ok(())
    }
}

#[async_trait]
impl TokenRepo for MemoryStore {
    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.check()?;
        self.lock().tokens.push(record.clone());
        Ok(())
    }

    async fn find(
        &self,
        hash: &[u8],
        scope: TokenScope,
        now: DateTime<Utc>,
    ) -> Result<(TokenRecord, Member), StoreError> {
        self.check()?;
        let inner = self.lock();
        let record = inner
            .tokens
            .iter()
            .find(|t| t.hash == hash && t.scope == scope && t.is_live_at(now))
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let member = inner
            .members
            .iter()
            .find(|m| m.id == record.member_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        Ok((record, member))
    }

    async fn delete_all_for_member(
        &self,
        scope: TokenScope,
        member_id: i64,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.lock()
            .tokens
            .retain(|t| !(t.scope == scope && t.member_id == member_id));
        Ok(())
    }
}

/// Records every message instead of delivering it.
#[derive(Clone, Default)]
pub(crate) struct CapturingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl CapturingMailer {
    pub(crate) fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl EmailSender for CapturingMailer {
    fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
