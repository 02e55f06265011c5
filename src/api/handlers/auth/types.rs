//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestCodeRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestCodeResponse {
    pub issued: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RedeemCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCodeResponse {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionEnvelope {
    pub user: Option<SessionUser>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignOutScope {
    Local,
    Global,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignOutRequest {
    pub scope: Option<SignOutScope>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AckResponse {
    pub ok: bool,
}
