use crate::domain::transaction::EventKind;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address snapshot consumed from the order/checkout engine and forwarded to
/// gateways untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddressData {
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub street_address_1: String,
    pub street_address_2: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub country_area: String,
    pub phone: String,
}

/// Static configuration for one gateway, keyed by its app identifier.
///
/// `connection_params` is an opaque, gateway-declared blob the core only
/// transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub gateway_id: String,
    pub gateway_name: String,
    pub supported_currencies: Vec<String>,
    pub auto_capture: bool,
    pub store_customer: bool,
    pub require_3d_secure: bool,
    pub connection_params: serde_json::Value,
}

impl GatewayConfig {
    pub fn new(gateway_id: &str, gateway_name: &str, currencies: &[&str]) -> Self {
        Self {
            gateway_id: gateway_id.to_string(),
            gateway_name: gateway_name.to_string(),
            supported_currencies: currencies.iter().map(|c| c.to_string()).collect(),
            auto_capture: true,
            store_customer: false,
            require_3d_secure: false,
            connection_params: serde_json::Value::Null,
        }
    }

    pub fn supports_currency(&self, currency: &str) -> bool {
        self.supported_currencies.iter().any(|c| c == currency)
    }
}

/// What a gateway app receives for one dispatch attempt. The action id is the
/// idempotency key; a retried action reuses it so the gateway can recognize
/// replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionData {
    pub action_id: Uuid,
    pub transaction_id: Uuid,
    pub kind: EventKind,
    pub amount: Decimal,
    pub currency: String,
    pub billing: Option<AddressData>,
    pub shipping: Option<AddressData>,
    /// Opaque per-gateway payload, transported but never interpreted.
    pub data: Option<serde_json::Value>,
}

/// Caller-supplied context forwarded with a dispatch: order-engine address
/// snapshots and an opaque per-gateway payload.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    pub billing: Option<AddressData>,
    pub shipping: Option<AddressData>,
    pub data: Option<serde_json::Value>,
}

/// A gateway's inline answer to a dispatched action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub is_success: bool,
    /// Further customer interaction is needed before the result is final.
    pub action_required: bool,
    pub action_required_data: Option<serde_json::Value>,
    pub kind: EventKind,
    pub amount: Decimal,
    pub currency: String,
    pub psp_reference: Option<String>,
    /// Mutually exclusive with `is_success`.
    pub error: Option<String>,
    /// Set when the gateway already settled this action elsewhere and the
    /// response must be merged into the in-flight transaction rather than
    /// spawning a new one.
    pub transaction_already_processed: bool,
}

/// How the gateway answered the dispatch call.
#[derive(Debug, Clone)]
pub enum GatewayReply {
    /// The result is in the response.
    Immediate(GatewayResponse),
    /// Session-based flow: the true result arrives later as a
    /// `SessionResult` keyed by the action id.
    Session,
}

/// The embedded event of an asynchronous confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub amount: Decimal,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSuccess {
    pub psp_reference: Option<String>,
    pub available_actions: Vec<String>,
    pub event: SessionEvent,
}

/// A later-arriving confirmation, keyed by the originating gateway/app
/// identifier and correlated back through the action id, never through a
/// transaction identity the gateway may not yet know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub app_identifier: String,
    pub response: Option<SessionSuccess>,
    pub error: Option<String>,
}

/// Normal form consumed by the reconciliation engine; both the synchronous
/// and the asynchronous path reduce to this.
#[derive(Debug, Clone)]
pub enum ActionResult {
    Success {
        kind: EventKind,
        amount: Decimal,
        psp_reference: Option<String>,
        message: Option<String>,
        /// The gateway settled this action on an earlier attempt; the result
        /// must be merged into the existing history, not recorded again.
        already_processed: bool,
    },
    Failure {
        message: String,
    },
}

impl From<GatewayResponse> for ActionResult {
    fn from(response: GatewayResponse) -> Self {
        if response.is_success {
            Self::Success {
                kind: response.kind,
                amount: response.amount,
                psp_reference: response.psp_reference,
                message: None,
                already_processed: response.transaction_already_processed,
            }
        } else {
            Self::Failure {
                message: response
                    .error
                    .unwrap_or_else(|| "gateway reported failure".to_string()),
            }
        }
    }
}

impl From<SessionResult> for ActionResult {
    fn from(result: SessionResult) -> Self {
        match (result.response, result.error) {
            (Some(success), None) => Self::Success {
                kind: success.event.kind,
                amount: success.event.amount,
                psp_reference: success.psp_reference,
                message: success.event.message,
                already_processed: false,
            },
            (_, Some(error)) => Self::Failure { message: error },
            (None, None) => Self::Failure {
                message: format!("empty session result from {}", result.app_identifier),
            },
        }
    }
}

/// Expiry and brand details for a tokenized card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCardInfo {
    pub brand: String,
    pub last_digits: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub first_digits: Option<String>,
}

/// A gateway-owned, user-scoped tokenized payment instrument. The core holds
/// only a cached projection of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodData {
    pub id: String,
    pub r#type: String,
    pub external_id: String,
    pub gateway_id: String,
    pub supported_flows: Vec<String>,
    pub credit_card_info: Option<CreditCardInfo>,
    pub name: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub payment_method_id: String,
    pub gateway_id: String,
    pub user_id: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: Option<String>,
}

/// The contract every gateway integration must satisfy.
///
/// Transport failures are reported as `PaymentError::GatewayUnreachable`;
/// business-level declines come back as an unsuccessful `GatewayResponse`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// The app identifier this gateway is registered under.
    fn id(&self) -> &str;

    /// Executes one action. May block or suspend for as long as the external
    /// party takes.
    async fn process_action(&self, action: ActionData) -> Result<GatewayReply>;

    /// Lists the tokenized payment methods this gateway holds for the user.
    async fn list_payment_methods(
        &self,
        user_id: &str,
        channel: &str,
    ) -> Result<Vec<PaymentMethodData>>;

    /// Asks the gateway to delete a stored payment method it owns.
    async fn delete_payment_method(&self, request: DeleteRequest) -> Result<DeleteResponse>;
}
