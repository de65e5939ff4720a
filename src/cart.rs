//! Session-scoped cart store.
//!
//! Every mutation loads the stored cart, applies the change to the [`Cart`]
//! aggregate and writes the whole cart back under [`CART_KEY`]. There is no
//! partial update and no cross-session synchronisation: the last writer wins.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::aggregates::{Cart, CartError, Product};
use crate::domain::value_objects::ProductId;
use crate::storage::{KeyValueStore, StorageError};

pub const CART_KEY: &str = "cart";

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cart(#[from] CartError),
}

#[derive(Clone)]
pub struct CartStore {
    store: Arc<dyn KeyValueStore>,
}

impl CartStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self { Self { store } }

    pub fn get(&self) -> Result<Cart, CartStoreError> {
        Ok(self.store.get::<Cart>(CART_KEY)?.unwrap_or_default())
    }

    pub fn add(&self, product: &Product) -> Result<Cart, CartStoreError> {
        self.update(|cart| {
            cart.add(product);
            Ok(())
        })
    }

    /// Sets the quantity of an entry already in the cart; unknown ids are a
    /// no-op. A quantity of 0 is rejected with [`CartError::InvalidQuantity`]
    /// and the stored cart is left as it was; use [`Self::remove`] instead.
    pub fn set_quantity(&self, product_id: ProductId, quantity: u32) -> Result<Cart, CartStoreError> {
        self.update(|cart| cart.set_quantity(product_id, quantity))
    }

    pub fn remove(&self, product_id: ProductId) -> Result<Cart, CartStoreError> {
        self.update(|cart| {
            cart.remove(product_id);
            Ok(())
        })
    }

    pub fn clear(&self) -> Result<(), CartStoreError> {
        self.store.remove(CART_KEY)?;
        Ok(())
    }

    pub fn total(&self) -> Result<Decimal, CartStoreError> { Ok(self.get()?.total()) }

    fn update(&self, f: impl FnOnce(&mut Cart) -> Result<(), CartError>) -> Result<Cart, CartStoreError> {
        let mut cart = self.get()?;
        f(&mut cart)?;
        self.store.set(CART_KEY, &cart)?;
        Ok(cart)
    }
}
