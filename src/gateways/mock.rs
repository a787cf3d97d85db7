use crate::domain::gateway::{
    ActionData, DeleteRequest, DeleteResponse, GatewayReply, GatewayResponse, PaymentGateway,
    PaymentMethodData,
};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Scripted behavior for one mock gateway instance.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Confirm the action inline.
    Succeed,
    /// Decline the action inline.
    Decline,
    /// Fail at the transport level.
    Unreachable,
    /// Session flow: the real result arrives later via `reconcile`.
    Session,
    /// Inline response asking for further customer action.
    RequireAction,
    /// Sleep, then confirm. Used to probe the per-transaction exclusion.
    Delay(Duration),
}

/// Test and replay gateway. Confirms whatever it is asked, according to its
/// scripted behavior, and counts invocations so tests can assert on
/// idempotency and serialization.
pub struct MockGateway {
    id: String,
    behavior: MockBehavior,
    methods: Vec<PaymentMethodData>,
    fail_listing: bool,
    fail_deletion: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_action: Mutex<Option<ActionData>>,
}

impl MockGateway {
    pub fn new(id: &str, behavior: MockBehavior) -> Self {
        Self {
            id: id.to_string(),
            behavior,
            methods: Vec::new(),
            fail_listing: false,
            fail_deletion: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_action: Mutex::new(None),
        }
    }

    pub fn with_payment_methods(mut self, methods: Vec<PaymentMethodData>) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn with_failing_deletion(mut self) -> Self {
        self.fail_deletion = true;
        self
    }

    /// Number of `process_action` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently executing `process_action` calls.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// The most recent action this gateway received, context included.
    pub fn last_action(&self) -> Option<ActionData> {
        self.last_action.lock().unwrap().clone()
    }

    fn success_response(&self, action: &ActionData) -> GatewayResponse {
        GatewayResponse {
            is_success: true,
            action_required: false,
            action_required_data: None,
            kind: action.kind,
            amount: action.amount,
            currency: action.currency.clone(),
            psp_reference: Some(format!("mock_{}", Uuid::new_v4())),
            error: None,
            transaction_already_processed: false,
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process_action(&self, action: ActionData) -> Result<GatewayReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        *self.last_action.lock().unwrap() = Some(action.clone());

        let reply = match &self.behavior {
            MockBehavior::Succeed => Ok(GatewayReply::Immediate(self.success_response(&action))),
            MockBehavior::Decline => Ok(GatewayReply::Immediate(GatewayResponse {
                is_success: false,
                action_required: false,
                action_required_data: None,
                kind: action.kind,
                amount: action.amount,
                currency: action.currency.clone(),
                psp_reference: None,
                error: Some("mock decline".to_string()),
                transaction_already_processed: false,
            })),
            MockBehavior::Unreachable => Err(PaymentError::GatewayUnreachable(
                "mock transport failure".to_string(),
            )),
            MockBehavior::Session => Ok(GatewayReply::Session),
            MockBehavior::RequireAction => {
                let mut response = self.success_response(&action);
                response.action_required = true;
                response.action_required_data =
                    Some(serde_json::json!({ "redirect": "https://3ds.example/confirm" }));
                Ok(GatewayReply::Immediate(response))
            }
            MockBehavior::Delay(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(GatewayReply::Immediate(self.success_response(&action)))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }

    async fn list_payment_methods(
        &self,
        _user_id: &str,
        _channel: &str,
    ) -> Result<Vec<PaymentMethodData>> {
        if self.fail_listing {
            return Err(PaymentError::GatewayUnreachable(
                "mock listing failure".to_string(),
            ));
        }
        Ok(self.methods.clone())
    }

    async fn delete_payment_method(&self, request: DeleteRequest) -> Result<DeleteResponse> {
        if self.fail_deletion {
            return Ok(DeleteResponse {
                success: false,
                message: Some("mock deletion refused".to_string()),
            });
        }
        Ok(DeleteResponse {
            success: true,
            message: Some(format!("deleted {}", request.payment_method_id)),
        })
    }
}
