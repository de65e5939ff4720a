use std::sync::Arc;

use crate::accounts::AccountService;
use crate::auth::{AuthService, TokenStore};
use crate::catalog::CatalogService;
use crate::checkout::CheckoutService;
use crate::contact::ContactRelay;
use crate::images::ImageStore;
use crate::orders::OrderService;
use crate::publisher::EventPublisher;
use crate::repository::Repository;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub contact: ContactRelay,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        images: Arc<dyn ImageStore>,
        events: Arc<dyn EventPublisher>,
        contact: ContactRelay,
    ) -> Self {
        let tokens = Arc::new(TokenStore::new());
        Self {
            auth: Arc::new(AuthService::new(repo.clone(), tokens.clone())),
            accounts: Arc::new(AccountService::new(repo.clone(), tokens)),
            catalog: Arc::new(CatalogService::new(repo.clone(), images, events.clone())),
            checkout: Arc::new(CheckoutService::new(repo.clone(), events.clone())),
            orders: Arc::new(OrderService::new(repo, events)),
            contact,
        }
    }
}
