//! Transaction-processed callback body.

use domain::{Money, PaymentOutcome};
use serde::{Deserialize, Serialize};

/// The only callback type that moves orders.
pub const TRANSACTION_TYPE: &str = "TRANSACTION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCallback {
    #[serde(rename = "type")]
    pub kind: String,
    pub obj: TransactionObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionObject {
    pub id: i64,
    pub pending: bool,
    pub amount_cents: i64,
    pub success: bool,
    pub is_auth: bool,
    pub is_capture: bool,
    pub is_standalone_payment: bool,
    pub is_voided: bool,
    pub is_refunded: bool,
    pub is_3d_secure: bool,
    pub integration_id: i64,
    pub has_parent_transaction: bool,
    pub owner: i64,
    /// Provider spelling.
    pub error_occured: bool,
    pub currency: String,
    pub created_at: String,
    pub order: TransactionOrder,
    pub source_data: TransactionSourceData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOrder {
    pub id: i64,
    /// Our order id, echoed back from intent creation.
    #[serde(default)]
    pub merchant_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSourceData {
    pub pan: String,
    pub sub_type: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TransactionObject {
    /// Maps the provider flags to a payment outcome.
    ///
    /// `None` means the transaction is still pending and nothing should change.
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        if self.error_occured {
            Some(PaymentOutcome::Declined)
        } else if self.success {
            Some(PaymentOutcome::Succeeded)
        } else if self.pending {
            None
        } else {
            Some(PaymentOutcome::Declined)
        }
    }

    /// The string the provider signs, in its documented field order.
    pub fn signing_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.amount_cents.to_string());
        out.push_str(&self.created_at);
        out.push_str(&self.currency);
        out.push_str(bool_str(self.error_occured));
        out.push_str(bool_str(self.has_parent_transaction));
        out.push_str(&self.id.to_string());
        out.push_str(&self.integration_id.to_string());
        out.push_str(bool_str(self.is_3d_secure));
        out.push_str(bool_str(self.is_auth));
        out.push_str(bool_str(self.is_capture));
        out.push_str(bool_str(self.is_refunded));
        out.push_str(bool_str(self.is_standalone_payment));
        out.push_str(bool_str(self.is_voided));
        out.push_str(&self.order.id.to_string());
        out.push_str(&self.owner.to_string());
        out.push_str(bool_str(self.pending));
        out.push_str(&self.source_data.pan);
        out.push_str(&self.source_data.sub_type);
        out.push_str(&self.source_data.kind);
        out.push_str(bool_str(self.success));
        out
    }

    /// Audit note stored with the resulting history entry.
    pub fn history_note(&self) -> String {
        format!(
            "Payment transaction {}: {} {}",
            self.id,
            Money::from_cents(self.amount_cents),
            self.currency
        )
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_string_follows_provider_field_order() {
        let callback = fixtures::transaction(Some("ignored".into()));
        assert_eq!(
            callback.obj.signing_string(),
            "210002024-06-13T11:33:44.592345EGPfalsefalse1920364654097558truefalsefalsefalse\
             truefalse2175037541043216false2346MasterCardcardtrue"
        );
    }

    #[test]
    fn test_outcome_mapping() {
        let mut obj = fixtures::transaction(None).obj;
        assert_eq!(obj.outcome(), Some(PaymentOutcome::Succeeded));

        obj.success = false;
        obj.pending = true;
        assert_eq!(obj.outcome(), None);

        obj.pending = false;
        assert_eq!(obj.outcome(), Some(PaymentOutcome::Declined));

        obj.success = true;
        obj.error_occured = true;
        assert_eq!(obj.outcome(), Some(PaymentOutcome::Declined));
    }

    #[test]
    fn test_parses_provider_body() {
        let body = serde_json::json!({
            "type": "TRANSACTION",
            "obj": {
                "id": 1, "pending": false, "amount_cents": 100, "success": true,
                "is_auth": false, "is_capture": false, "is_standalone_payment": true,
                "is_voided": false, "is_refunded": false, "is_3d_secure": false,
                "integration_id": 2, "has_parent_transaction": false, "owner": 3,
                "error_occured": false, "currency": "EGP", "created_at": "2024-01-01T00:00:00",
                "order": { "id": 4 },
                "source_data": { "pan": "1111", "sub_type": "Visa", "type": "card" },
                "extra_field": "ignored"
            }
        });
        let parsed: TransactionCallback = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.obj.order.merchant_order_id, None);
        assert_eq!(parsed.obj.history_note(), "Payment transaction 1: 1.00 EGP");
    }
}
