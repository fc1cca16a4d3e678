#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use vaultbank_core::adapters::MemoryStore;
use vaultbank_core::domain::{Account, NewRecipient, Profile};
use vaultbank_core::ports::{CodeSender, DeliveryError, ProfileRepository};
use vaultbank_core::use_cases::{
    Core, CoreSettings, ManualAdjustment, OtpPolicy, RecipientRef, TransferRequest,
};

/// Keeps every code it is asked to deliver so tests can confirm transfers.
#[derive(Default)]
pub struct CapturingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingSender {
    pub fn last_code(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, code)| code.clone())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeSender for CapturingSender {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub codes: Arc<CapturingSender>,
    pub core: Core,
    pub admin_id: Uuid,
}

pub fn usd(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

pub fn harness() -> Harness {
    harness_with(CoreSettings::default())
}

pub fn harness_without_otp() -> Harness {
    harness_with(CoreSettings {
        otp_policy: OtpPolicy::disabled(),
        ..CoreSettings::default()
    })
}

pub fn harness_with(settings: CoreSettings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let codes = Arc::new(CapturingSender::default());
    let core = Core::new(store.clone(), codes.clone(), settings);
    Harness {
        store,
        codes,
        core,
        admin_id: Uuid::new_v4(),
    }
}

impl Harness {
    /// A user with a profile and one empty checking account.
    pub async fn customer(&self, can_transact: bool) -> (Uuid, Account) {
        let user_id = Uuid::new_v4();
        self.store
            .upsert_profile(&Profile {
                user_id,
                email: format!("{}@example.com", user_id.simple()),
                full_name: Some("Test Customer".to_string()),
                can_transact,
            })
            .await
            .unwrap();
        let account = self
            .core
            .ledger
            .open_account(user_id, "checking", "USD")
            .await
            .unwrap();
        (user_id, account)
    }

    /// A transacting customer whose account holds `amount`.
    pub async fn funded_customer(&self, amount: &str) -> (Uuid, Account) {
        let (user_id, account) = self.customer(true).await;
        self.deposit(account.id, amount).await;
        let account = self.core.ledger.get_account(account.id).await.unwrap();
        (user_id, account)
    }

    pub async fn deposit(&self, account_id: Uuid, amount: &str) {
        self.core
            .admin
            .manual_deposit(
                self.admin_id,
                ManualAdjustment {
                    account_id,
                    amount: usd(amount),
                    effective_date: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    pub async fn balance(&self, account_id: Uuid) -> BigDecimal {
        self.core
            .ledger
            .get_account(account_id)
            .await
            .unwrap()
            .balance
    }
}

pub fn new_recipient(identifier: &str) -> RecipientRef {
    RecipientRef::New(NewRecipient {
        recipient_name: "Jane Doe".to_string(),
        bank_name: Some("First Bank".to_string()),
        account_identifier: identifier.to_string(),
    })
}

pub fn transfer(account_id: Uuid, amount: &str) -> TransferRequest {
    TransferRequest {
        account_id,
        recipient: new_recipient("GB29NWBK60161331926819"),
        amount: usd(amount),
        description: None,
    }
}
