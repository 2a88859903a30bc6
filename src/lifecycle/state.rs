use std::fmt;
use crate::data::types::{OrderDetails, OrderId};

/// Where an order is in its life on this client. Once an order leaves
/// `AwaitingBids` it never returns there; `Accepted` and `Cancelled` are final.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState {
    CollectingAddresses,
    Ready,
    Submitting,
    AwaitingBids { order_id: OrderId },
    Accepted { details: OrderDetails },
    Cancelled { order_id: OrderId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    AddressesValid,
    AddressesInvalid,
    SubmitRequested,
    OrderCreated(OrderId),
    SubmitFailed,
    BidAccepted(OrderDetails),
    WindowExpired,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("order already finished ({state})")]
    Terminal { state: &'static str },

    #[error("{event} is not valid while {state}")]
    Invalid { state: &'static str, event: &'static str },
}

impl LifecycleState {
    pub fn apply(&self, event: LifecycleEvent) -> Result<LifecycleState, TransitionError> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        if self.is_terminal() {
            return Err(TransitionError::Terminal { state: self.name() });
        }

        let next = match (self, event) {
            (S::CollectingAddresses | S::Ready, E::AddressesValid) => S::Ready,
            (S::CollectingAddresses | S::Ready, E::AddressesInvalid) => S::CollectingAddresses,
            (S::Ready, E::SubmitRequested) => S::Submitting,
            (S::Submitting, E::OrderCreated(order_id)) => S::AwaitingBids { order_id },
            (S::Submitting, E::SubmitFailed) => S::Ready,
            (S::AwaitingBids { .. }, E::BidAccepted(details)) => S::Accepted { details },
            (S::AwaitingBids { order_id }, E::WindowExpired) => S::Cancelled {
                order_id: order_id.clone(),
            },
            (state, event) => {
                return Err(TransitionError::Invalid {
                    state: state.name(),
                    event: event.name(),
                })
            }
        };

        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Accepted { .. } | LifecycleState::Cancelled { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::CollectingAddresses => "collecting-addresses",
            LifecycleState::Ready => "ready",
            LifecycleState::Submitting => "submitting",
            LifecycleState::AwaitingBids { .. } => "awaiting-bids",
            LifecycleState::Accepted { .. } => "accepted",
            LifecycleState::Cancelled { .. } => "cancelled",
        }
    }
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::AddressesValid => "addresses-valid",
            LifecycleEvent::AddressesInvalid => "addresses-invalid",
            LifecycleEvent::SubmitRequested => "submit",
            LifecycleEvent::OrderCreated(_) => "order-created",
            LifecycleEvent::SubmitFailed => "submit-failed",
            LifecycleEvent::BidAccepted(_) => "bid-accepted",
            LifecycleEvent::WindowExpired => "window-expired",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
