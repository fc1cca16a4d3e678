//! Append-only admin action log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminActionType {
    ManualDeposit,
    ManualWithdrawal,
    SetTransactionPermission,
    SetAccountStatus,
    ResolvePending,
    MarkDisputed,
}

impl AdminActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminActionType::ManualDeposit => "manual_deposit",
            AdminActionType::ManualWithdrawal => "manual_withdrawal",
            AdminActionType::SetTransactionPermission => "set_transaction_permission",
            AdminActionType::SetAccountStatus => "set_account_status",
            AdminActionType::ResolvePending => "resolve_pending",
            AdminActionType::MarkDisputed => "mark_disputed",
        }
    }
}

impl FromStr for AdminActionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_deposit" => Ok(AdminActionType::ManualDeposit),
            "manual_withdrawal" => Ok(AdminActionType::ManualWithdrawal),
            "set_transaction_permission" => Ok(AdminActionType::SetTransactionPermission),
            "set_account_status" => Ok(AdminActionType::SetAccountStatus),
            "resolve_pending" => Ok(AdminActionType::ResolvePending),
            "mark_disputed" => Ok(AdminActionType::MarkDisputed),
            other => Err(ParseEnumError::new("admin action", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAction {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action_type: AdminActionType,
    pub target_user_id: Uuid,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AdminAction {
    pub fn new(
        admin_id: Uuid,
        action_type: AdminActionType,
        target_user_id: Uuid,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            admin_id,
            action_type,
            target_user_id,
            details,
            created_at: Utc::now(),
        }
    }
}
