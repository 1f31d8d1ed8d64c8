//! Account records served by `/account/{id}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::http::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountTier {
    Free,
    Premium,
    Pro,
}

/// Usage and subscription data of the account a user belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub account_tier: AccountTier,
    pub status: AccountStatus,
    pub meeting_seconds_used: u64,
    pub storage_used_in_bytes: u64,
    pub tokens_used: u64,
    #[serde(default)]
    pub signature_id: Option<String>,
    #[serde(default)]
    pub signature_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signature_end_date: Option<DateTime<Utc>>,
}

pub async fn fetch_account(api: &ApiClient, id: &str) -> Result<Account, Error> {
    api.get(&format!("/account/{id}")).await
}
