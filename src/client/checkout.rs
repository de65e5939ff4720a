use tokio::sync::watch;

use crate::client::{Route, StorefrontClient};
use crate::domain::aggregates::ShippingDetails;
use crate::domain::value_objects::OrderId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CheckoutState {
    #[default]
    Idle,
    Submitting,
    Succeeded(OrderId),
    Failed(String),
}

/// Drives one checkout form: `Idle -> Submitting -> Succeeded | Failed`.
pub struct CheckoutFlow {
    tx: watch::Sender<CheckoutState>,
}

impl Default for CheckoutFlow {
    fn default() -> Self { Self::new() }
}

impl CheckoutFlow {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(CheckoutState::Idle);
        Self { tx }
    }

    pub fn state(&self) -> CheckoutState { self.tx.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> { self.tx.subscribe() }

    /// Submits the cart. A submit while one is already in flight is ignored.
    pub async fn submit(&self, client: &StorefrontClient, shipping: &ShippingDetails) -> CheckoutState {
        let started = self.tx.send_if_modified(|state| {
            if *state == CheckoutState::Submitting {
                return false;
            }
            *state = CheckoutState::Submitting;
            true
        });
        if !started {
            return CheckoutState::Submitting;
        }

        let next = match client.cart().get() {
            Ok(cart) if cart.is_empty() => CheckoutState::Failed("your cart is empty".to_string()),
            Ok(_) => match client.checkout(shipping).await {
                Ok(order) => CheckoutState::Succeeded(order.id()),
                Err(e) => CheckoutState::Failed(e.to_string()),
            },
            Err(e) => CheckoutState::Failed(e.to_string()),
        };
        self.tx.send_replace(next.clone());
        next
    }

    /// Navigation after the last submit: the order list on success, login
    /// when the failure signed the user out.
    pub fn next_route(&self, client: &StorefrontClient) -> Option<Route> {
        match &*self.tx.borrow() {
            CheckoutState::Succeeded(_) => Some(Route::Orders),
            CheckoutState::Failed(_) if !client.session().is_signed_in() => Some(Route::Login),
            _ => None,
        }
    }

    pub fn reset(&self) { self.tx.send_replace(CheckoutState::Idle); }
}
