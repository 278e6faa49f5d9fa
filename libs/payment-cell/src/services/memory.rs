// libs/payment-cell/src/services/memory.rs
//! In-process account and reconciliation stores for tests.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::models::{ChargeReconciliation, PayoutReconciliation, UserAccount};
use crate::services::accounts::{AccountStore, ReconciliationStore};

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, UserAccount>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, account: UserAccount) {
        self.accounts.write().await.insert(account.id, account);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserAccount>, PaymentError> {
        Ok(self.accounts.read().await.get(&user_id).cloned())
    }

    async fn set_stripe_customer(&self, user_id: Uuid, customer_id: &str) -> Result<(), PaymentError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(user_id).or_insert_with(|| UserAccount { id: user_id, ..Default::default() });
        account.stripe_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn set_stripe_account(&self, user_id: Uuid, account_id: &str) -> Result<(), PaymentError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(user_id).or_insert_with(|| UserAccount { id: user_id, ..Default::default() });
        account.stripe_account_id = Some(account_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryReconciliationStore {
    entries: RwLock<Vec<PayoutReconciliation>>,
    charges: RwLock<Vec<ChargeReconciliation>>,
}

impl MemoryReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<PayoutReconciliation> {
        self.entries.read().await.clone()
    }

    pub async fn charges(&self) -> Vec<ChargeReconciliation> {
        self.charges.read().await.clone()
    }
}

#[async_trait]
impl ReconciliationStore for MemoryReconciliationStore {
    async fn record(&self, entry: &PayoutReconciliation) -> Result<(), PaymentError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn open_payouts(&self, professional_id: Uuid) -> Result<Vec<PayoutReconciliation>, PaymentError> {
        Ok(self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.professional_id == professional_id && e.resolved_at.is_none())
            .cloned()
            .collect())
    }

    async fn resolve_payout(&self, id: Uuid, resolved_at: DateTime<Utc>) -> Result<(), PaymentError> {
        if let Some(entry) = self.entries.write().await.iter_mut().find(|e| e.id == id) {
            entry.resolved_at.get_or_insert(resolved_at);
        }
        Ok(())
    }

    async fn record_charge(&self, entry: &ChargeReconciliation) -> Result<(), PaymentError> {
        self.charges.write().await.push(entry.clone());
        Ok(())
    }
}
