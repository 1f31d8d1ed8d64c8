//! User records served by `/user/{id}`.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::http::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    pub role: Role,
    pub is_onboarded: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial update sent with PATCH; unset fields are left untouched server side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_onboarded: Option<bool>,
}

pub async fn fetch_user(api: &ApiClient, id: &str) -> Result<User, Error> {
    api.get(&format!("/user/{id}")).await
}

pub async fn update_user(api: &ApiClient, id: &str, update: &UserUpdate) -> Result<User, Error> {
    api.patch(&format!("/user/{id}"), update).await
}

/// Delete a user. The server answers with whether anything was removed.
pub async fn delete_user(api: &ApiClient, id: &str) -> Result<bool, Error> {
    let response = api.send(api.request(Method::DELETE, &format!("/user/{id}"))).await?;
    Ok(response.json().await?)
}
