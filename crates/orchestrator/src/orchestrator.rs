//! The five orchestration operations tying gateway, messaging and
//! storage together. Constructed with injected adapters; no process-wide
//! singletons.

use std::sync::Arc;

use tracing::{error, info, warn};

use pagoflow_core::config::BrandConfig;
use pagoflow_core::domain::item::validate_items;
use pagoflow_core::{
    CartItem, ConversationId, ConversationState, CustomerInfo, FlowId, FlowStatus,
    OrchestrationError, PaymentFlow, PhoneNumber, StatusTransition, ValidationError,
};
use pagoflow_db::stores::{ConversationStore, PaymentFlowStore, StoreError};
use pagoflow_mercadopago::models::{PaymentDetails, PreferenceRequest};
use pagoflow_mercadopago::{classify, failure_reason, PaymentGateway, PaymentStatusKind};
use pagoflow_whatsapp::messages::{
    PaymentConfirmationMessage, PaymentFailureMessage, PaymentLinkMessage,
};
use pagoflow_whatsapp::WhatsAppMessaging;

use crate::conversation::ConversationManager;
use crate::intent::{self, MessageIntent};

/// Inbound WhatsApp message, already normalized by the webhook layer.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
}

/// What the channel should do in response to an inbound message. `None`
/// from the handler means no reply at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageAction {
    /// Free-text reply to send back on the conversation.
    Reply(String),
    /// A payment flow was started; the link message has already gone out.
    PaymentInitiated(FlowId),
}

/// Per-step visibility into a webhook-driven status update. The flow
/// store write is the correctness-critical effect; message delivery is
/// best-effort and reported, not raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdateOutcome {
    pub flow_found: bool,
    pub transition: Option<StatusTransition>,
    pub message_sent: bool,
}

impl StatusUpdateOutcome {
    fn untracked() -> Self {
        Self { flow_found: false, transition: None, message_sent: false }
    }
}

pub struct PaymentOrchestrator<G, M, F, C> {
    gateway: Arc<G>,
    messaging: Arc<M>,
    flows: Arc<F>,
    conversations: ConversationManager<C>,
    brand: BrandConfig,
}

impl<G, M, F, C> PaymentOrchestrator<G, M, F, C>
where
    G: PaymentGateway,
    M: WhatsAppMessaging,
    F: PaymentFlowStore,
    C: ConversationStore,
{
    pub fn new(
        gateway: Arc<G>,
        messaging: Arc<M>,
        flows: Arc<F>,
        conversations: ConversationManager<C>,
        brand: BrandConfig,
    ) -> Self {
        Self { gateway, messaging, flows, conversations, brand }
    }

    pub fn conversations(&self) -> &ConversationManager<C> {
        &self.conversations
    }

    /// Runs a cart through preference creation and link delivery. The
    /// flow record is persisted at every status it passes through, so a
    /// crash mid-operation leaves an inspectable trail. Gateway and
    /// messaging failures surface unchanged after a best-effort `failed`
    /// mark on the stored flow.
    pub async fn initiate_payment_flow(
        &self,
        conversation_id: &ConversationId,
        customer_phone: &PhoneNumber,
        items: Vec<CartItem>,
        customer: CustomerInfo,
    ) -> Result<PaymentFlow, OrchestrationError> {
        validate_items(&items)?;

        let mut context = self.conversations.get_or_create(conversation_id, customer_phone).await?;

        // One live checkout per conversation; a second initiation while a
        // link is still collectable would risk a double charge.
        if let Some(active_id) = &context.active_payment_flow {
            if let Some(active) = self.flows.get(active_id).await.map_err(store_err)? {
                if active.is_active() {
                    return Err(ValidationError::ActiveFlowExists {
                        conversation_id: conversation_id.to_string(),
                        flow_id: active_id.to_string(),
                    }
                    .into());
                }
            }
        }

        let mut flow =
            PaymentFlow::new(conversation_id.clone(), customer_phone.clone(), items, customer);

        info!(
            event_name = "payment.flow_initiated",
            flow_id = %flow.flow_id,
            conversation_id = %conversation_id,
            customer_phone = %customer_phone.as_str(),
            item_count = flow.items.len(),
            "payment flow initiated"
        );

        context.set_state(ConversationState::PaymentRequested);
        context.record_flow(flow.flow_id.clone());
        self.conversations.save(&context).await?;
        self.flows.put(&flow).await.map_err(store_err)?;

        let request = PreferenceRequest {
            flow_id: flow.flow_id.clone(),
            conversation_id: conversation_id.clone(),
            customer_phone: customer_phone.clone(),
            customer: flow.customer.clone(),
            items: flow.items.clone(),
            expires_at: None,
        };
        let preference = match self.gateway.create_preference(&request).await {
            Ok(preference) => preference,
            Err(gateway_err) => {
                self.mark_flow_failed(&mut flow).await;
                return Err(gateway_err.into());
            }
        };

        flow.attach_preference(
            preference.preference_id.clone(),
            preference.transaction_id.clone(),
            preference.checkout_url.clone(),
            Some(preference.expires_at),
        )?;
        self.flows.update(&flow).await.map_err(store_err)?;

        let link_message = PaymentLinkMessage {
            brand_name: self.brand.name.clone(),
            customer_name: flow.customer.name.clone(),
            items: flow.items.clone(),
            total_amount: flow.total_amount(),
            checkout_url: preference.checkout_url,
            expires_at: preference.expires_at,
        };
        if let Err(messaging_err) =
            self.messaging.send_payment_link(customer_phone, &link_message).await
        {
            self.mark_flow_failed(&mut flow).await;
            return Err(messaging_err.into());
        }

        flow.mark_link_sent()?;
        self.flows.update(&flow).await.map_err(store_err)?;

        info!(
            event_name = "payment.link_sent",
            flow_id = %flow.flow_id,
            payment_id = flow.payment_id.as_deref().unwrap_or(""),
            "payment link delivered"
        );

        Ok(flow)
    }

    /// Applies a webhook-reported payment status. Unknown payment ids are
    /// a benign miss (the vendor must not retry forever for flows this
    /// system never tracked); an `Err` tells the webhook layer to answer
    /// retryable.
    pub async fn process_payment_status_update(
        &self,
        details: &PaymentDetails,
    ) -> Result<StatusUpdateOutcome, OrchestrationError> {
        info!(
            event_name = "payment.status_update_received",
            payment_id = %details.payment_id,
            status = details.status.as_str(),
            "payment status update"
        );

        let Some(mut flow) =
            self.flows.get_by_payment_id(&details.payment_id).await.map_err(store_err)?
        else {
            warn!(
                event_name = "payment.flow_not_found",
                payment_id = %details.payment_id,
                "no flow tracked for payment id"
            );
            return Ok(StatusUpdateOutcome::untracked());
        };

        let kind = classify(details.status);
        let target = match kind {
            PaymentStatusKind::Successful => Some(FlowStatus::PaymentApproved),
            PaymentStatusKind::Failed => Some(FlowStatus::PaymentFailed),
            PaymentStatusKind::Pending => Some(FlowStatus::PaymentPending),
            PaymentStatusKind::Other => None,
        };

        let transition = match target {
            Some(next) => Some(flow.apply_status(next)),
            None => None,
        };
        let applied = transition.as_ref().is_some_and(StatusTransition::was_applied);

        if applied || target.is_none() {
            flow.payment_status = Some(details.status.as_str().to_owned());
            flow.payment_data = Some(details.raw.clone());
            flow.touch();
            self.flows.update(&flow).await.map_err(store_err)?;
        } else {
            info!(
                event_name = "payment.status_superseded",
                flow_id = %flow.flow_id,
                current = flow.status.as_str(),
                rejected = details.status.as_str(),
                "out-of-order status update ignored"
            );
        }

        let mut message_sent = false;
        if applied {
            message_sent = match kind {
                PaymentStatusKind::Successful => self.handle_payment_success(&flow, details).await,
                PaymentStatusKind::Failed => self.handle_payment_failure(&flow, details).await,
                PaymentStatusKind::Pending => {
                    self.update_conversation_state(
                        &flow.conversation_id,
                        ConversationState::PaymentPending,
                    )
                    .await;
                    false
                }
                PaymentStatusKind::Other => false,
            };
        }

        Ok(StatusUpdateOutcome { flow_found: true, transition, message_sent })
    }

    /// Intent dispatch for an inbound customer message. Never raises:
    /// failures collapse into an apology reply or no reply at all, the
    /// channel is not a place to surface stack traces.
    pub async fn handle_conversation_message(
        &self,
        conversation_id: &ConversationId,
        message: &InboundMessage,
    ) -> Option<MessageAction> {
        let phone = match PhoneNumber::parse(&message.sender) {
            Ok(phone) => phone,
            Err(err) => {
                warn!(
                    event_name = "conversation.invalid_sender",
                    conversation_id = %conversation_id,
                    error = %err,
                    "unparseable sender phone"
                );
                return None;
            }
        };

        let context = match self.conversations.get_or_create(conversation_id, &phone).await {
            Ok(context) => context,
            Err(err) => {
                error!(
                    event_name = "conversation.load_failed",
                    conversation_id = %conversation_id,
                    error = %err,
                    "conversation context unavailable"
                );
                return None;
            }
        };

        match intent::classify(&message.text) {
            Some(MessageIntent::Payment) => {
                if context.cart_items.is_empty() {
                    return Some(MessageAction::Reply(
                        "Tu carrito está vacío. ¿Te gustaría ver nuestros productos?".to_owned(),
                    ));
                }
                match self
                    .initiate_payment_flow(
                        conversation_id,
                        &phone,
                        context.cart_items.clone(),
                        context.customer.clone(),
                    )
                    .await
                {
                    Ok(flow) => Some(MessageAction::PaymentInitiated(flow.flow_id)),
                    Err(err) => {
                        error!(
                            event_name = "payment.initiation_failed",
                            conversation_id = %conversation_id,
                            error = %err,
                            "payment intent could not start a flow"
                        );
                        Some(MessageAction::Reply(
                            "Hubo un error al procesar tu pago. Por favor intenta de nuevo."
                                .to_owned(),
                        ))
                    }
                }
            }
            Some(MessageIntent::CartAction) => {
                if intent::is_clear_cart(&message.text) {
                    if let Err(err) = self.conversations.clear_cart(conversation_id).await {
                        error!(
                            event_name = "conversation.cart_clear_failed",
                            conversation_id = %conversation_id,
                            error = %err,
                            "cart clear did not persist"
                        );
                        return None;
                    }
                    return Some(MessageAction::Reply("Tu carrito ha sido vaciado.".to_owned()));
                }
                None
            }
            Some(MessageIntent::ProductInquiry) => Some(MessageAction::Reply(
                "¿En qué producto estás interesado? Puedo ayudarte con información sobre \
                 tallas, colores y disponibilidad."
                    .to_owned(),
            )),
            None => {
                if let Err(err) = self.conversations.update_last_activity(conversation_id).await {
                    warn!(
                        event_name = "conversation.touch_failed",
                        conversation_id = %conversation_id,
                        error = %err,
                        "activity bump did not persist"
                    );
                }
                None
            }
        }
    }

    /// Starts a fresh flow with the failed flow's cart and links the two
    /// through metadata. `false` covers every failure mode, including an
    /// unknown original flow.
    pub async fn retry_failed_payment(
        &self,
        flow_id: &FlowId,
        customer_phone: &PhoneNumber,
    ) -> bool {
        let original = match self.flows.get(flow_id).await {
            Ok(Some(flow)) => flow,
            Ok(None) => {
                warn!(
                    event_name = "payment.retry_missing_flow",
                    flow_id = %flow_id,
                    "no flow to retry"
                );
                return false;
            }
            Err(err) => {
                error!(event_name = "payment.retry_failed", flow_id = %flow_id, error = %err,
                    "flow lookup failed");
                return false;
            }
        };

        let mut retry = match self
            .initiate_payment_flow(
                &original.conversation_id,
                customer_phone,
                original.items.clone(),
                original.customer.clone(),
            )
            .await
        {
            Ok(flow) => flow,
            Err(err) => {
                error!(
                    event_name = "payment.retry_failed",
                    flow_id = %flow_id,
                    error = %err,
                    "retry initiation failed"
                );
                return false;
            }
        };

        let attempt = original
            .metadata
            .get("retry_attempt")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
            + 1;
        retry
            .metadata
            .insert("original_flow_id".to_owned(), serde_json::Value::from(flow_id.to_string()));
        retry.metadata.insert("retry_attempt".to_owned(), serde_json::Value::from(attempt));
        retry.touch();
        if let Err(err) = self.flows.update(&retry).await {
            error!(
                event_name = "payment.retry_failed",
                flow_id = %retry.flow_id,
                error = %err,
                "retry lineage did not persist"
            );
            return false;
        }

        info!(
            event_name = "payment.retry_initiated",
            original_flow_id = %flow_id,
            retry_flow_id = %retry.flow_id,
            retry_attempt = attempt,
            "payment retry started"
        );
        true
    }

    /// Local cancellation always proceeds, whatever the remote cancel
    /// says: the flow must stop being actionable on our side even when
    /// the vendor refuses to expire the preference.
    pub async fn cancel_payment_flow(&self, flow_id: &FlowId, reason: &str) -> bool {
        let mut flow = match self.flows.get(flow_id).await {
            Ok(Some(flow)) => flow,
            Ok(None) => {
                warn!(
                    event_name = "payment.cancel_missing_flow",
                    flow_id = %flow_id,
                    "no flow to cancel"
                );
                return false;
            }
            Err(err) => {
                error!(event_name = "payment.cancel_failed", flow_id = %flow_id, error = %err,
                    "flow lookup failed");
                return false;
            }
        };

        if let Some(preference_id) = &flow.payment_id {
            match self.gateway.cancel_preference(preference_id).await {
                Ok(true) => {}
                Ok(false) => warn!(
                    event_name = "payment.remote_cancel_refused",
                    flow_id = %flow_id,
                    "vendor kept the preference open"
                ),
                Err(err) => warn!(
                    event_name = "payment.remote_cancel_failed",
                    flow_id = %flow_id,
                    error = %err,
                    "remote cancel errored, continuing locally"
                ),
            }
        }

        if !flow.cancel(reason) {
            // Terminal flows stay where they are.
            return false;
        }
        if let Err(err) = self.flows.update(&flow).await {
            error!(
                event_name = "payment.cancel_failed",
                flow_id = %flow_id,
                error = %err,
                "cancellation did not persist"
            );
            return false;
        }

        self.update_conversation_state(&flow.conversation_id, ConversationState::Browsing).await;

        info!(
            event_name = "payment.flow_cancelled",
            flow_id = %flow_id,
            reason,
            "payment flow cancelled"
        );
        true
    }

    async fn handle_payment_success(&self, flow: &PaymentFlow, details: &PaymentDetails) -> bool {
        let confirmation = PaymentConfirmationMessage {
            brand_name: self.brand.name.clone(),
            customer_name: flow.customer.name.clone(),
            items: flow.items.clone(),
            total_amount: flow.total_amount(),
            payment_id: details.payment_id.clone(),
            approval_code: details.approval_code.clone(),
        };
        let sent = match self
            .messaging
            .send_payment_confirmation(&flow.customer_phone, &confirmation)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    event_name = "payment.confirmation_send_failed",
                    flow_id = %flow.flow_id,
                    error = %err,
                    "confirmation message not delivered"
                );
                false
            }
        };

        self.update_conversation_state(
            &flow.conversation_id,
            ConversationState::PaymentCompleted,
        )
        .await;
        if let Err(err) = self.conversations.clear_cart(&flow.conversation_id).await {
            warn!(
                event_name = "conversation.cart_clear_failed",
                conversation_id = %flow.conversation_id,
                error = %err,
                "cart not cleared after approval"
            );
        }
        sent
    }

    async fn handle_payment_failure(&self, flow: &PaymentFlow, details: &PaymentDetails) -> bool {
        let reason = failure_reason(details.status, details.status_detail.as_deref());
        let failure = PaymentFailureMessage {
            brand_name: self.brand.name.clone(),
            customer_name: flow.customer.name.clone(),
            reason,
            retry_url: None,
            support_phone: self.brand.support_phone.clone(),
        };
        let sent =
            match self.messaging.send_payment_failure(&flow.customer_phone, &failure).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        event_name = "payment.failure_send_failed",
                        flow_id = %flow.flow_id,
                        error = %err,
                        "failure message not delivered"
                    );
                    false
                }
            };

        self.update_conversation_state(&flow.conversation_id, ConversationState::PaymentFailed)
            .await;
        sent
    }

    /// Conversation-side bookkeeping never blocks the flow-side outcome.
    async fn update_conversation_state(&self, id: &ConversationId, state: ConversationState) {
        if let Err(err) = self.conversations.update_state(id, state).await {
            warn!(
                event_name = "conversation.state_update_failed",
                conversation_id = %id,
                error = %err,
                "conversation state not persisted"
            );
        }
    }

    /// Best-effort failure mark. The original error stays the signaled
    /// cause; a store failure here is only logged.
    async fn mark_flow_failed(&self, flow: &mut PaymentFlow) {
        flow.apply_status(FlowStatus::Failed);
        if let Err(err) = self.flows.update(flow).await {
            error!(
                event_name = "payment.failure_mark_lost",
                flow_id = %flow.flow_id,
                error = %err,
                "could not persist failed status"
            );
        }
    }
}

fn store_err(err: StoreError) -> OrchestrationError {
    OrchestrationError::Store(err.to_string())
}
