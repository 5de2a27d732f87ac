//! Platform API data models shared across resources.

use serde::Deserialize;

/// The organization the credentials belong to (`GET /organizations/me`).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_country_code: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// An authorization division.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Division {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub home_division: Option<bool>,
}

/// One page of `GET /authorization/divisions`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DivisionListing {
    #[serde(default)]
    pub entities: Vec<Division>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

/// Reference to another entity by id.
#[derive(Deserialize, serde::Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// OAuth token grant.
#[derive(Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body returned by the platform on non-success responses.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    /// OAuth endpoints use `error`/`error_description` instead.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "error_description")]
    pub error_description: Option<String>,
}

impl ApiErrorBody {
    /// The most descriptive message in the body.
    pub fn describe(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(message.clone());
        }
        match (&self.error, &self.error_description) {
            (Some(err), Some(desc)) => Some(format!("{} ({})", err, desc)),
            (Some(err), None) => Some(err.clone()),
            (None, Some(desc)) => Some(desc.clone()),
            (None, None) => None,
        }
    }
}
