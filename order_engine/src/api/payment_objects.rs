use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::state_machine::OrderTrigger;

/// A notification posted by the payment gateway. All fields are strings, exactly as the gateway sends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_status: String,
    pub status_code: String,
    pub gross_amount: String,
    #[serde(default)]
    pub payment_type: Option<String>,
    pub signature_key: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// The subset of the gateway's transaction status vocabulary that affects orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
}

impl GatewayStatus {
    pub fn to_trigger(self, payment_method: Option<String>) -> OrderTrigger {
        match self {
            Self::Capture | Self::Settlement => OrderTrigger::GatewaySettled { payment_method },
            Self::Pending => OrderTrigger::GatewayPending { payment_method },
            Self::Deny | Self::Cancel => OrderTrigger::GatewayFailed,
            Self::Expire => OrderTrigger::GatewayExpired,
        }
    }
}

impl FromStr for GatewayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "capture" => Ok(Self::Capture),
            "settlement" => Ok(Self::Settlement),
            "pending" => Ok(Self::Pending),
            "deny" => Ok(Self::Deny),
            "cancel" => Ok(Self::Cancel),
            "expire" => Ok(Self::Expire),
            other => Err(format!("Unsupported transaction status: {other}")),
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Capture => "capture",
            Self::Settlement => "settlement",
            Self::Pending => "pending",
            Self::Deny => "deny",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
        };
        f.write_str(s)
    }
}
