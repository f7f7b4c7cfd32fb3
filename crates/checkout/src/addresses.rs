//! Saved shipping addresses.

use std::sync::Arc;

use common::{AddressId, UserId};
use domain::Address;
use serde::Deserialize;
use store::{Store, finish, with_timeout};

use crate::error::{CheckoutError, Result};
use crate::settings::CheckoutSettings;

/// Fields a user supplies when saving an address.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: Option<String>,
    pub country: String,
}

/// Saves and resolves a user's shipping addresses.
pub struct AddressService {
    store: Arc<dyn Store>,
    settings: CheckoutSettings,
}

impl AddressService {
    pub fn new(store: Arc<dyn Store>, settings: CheckoutSettings) -> Self {
        Self { store, settings }
    }

    pub async fn save_address(&self, user_id: UserId, new: NewAddress) -> Result<Address> {
        let address = Address {
            id: AddressId::new(),
            user_id,
            recipient: new.recipient,
            phone: new.phone,
            street: new.street,
            city: new.city,
            region: new.region,
            postal_code: new.postal_code,
            country: new.country,
        };

        with_timeout(self.settings.store_timeout, "save address", async {
            let mut tx = self.store.begin().await?;
            let result = tx
                .insert_address(&address)
                .await
                .map_err(CheckoutError::from);
            finish(tx, result).await
        })
        .await?;

        tracing::info!(address_id = %address.id, %user_id, "address saved");
        Ok(address)
    }

    /// Returns the address only if it belongs to `user_id`.
    pub async fn get_address(&self, user_id: UserId, address_id: AddressId) -> Result<Address> {
        with_timeout(self.settings.store_timeout, "get address", async {
            let mut tx = self.store.begin().await?;
            let result = tx
                .address(user_id, address_id)
                .await
                .map_err(CheckoutError::from);
            finish(tx, result).await
        })
        .await?
        .ok_or(CheckoutError::AddressNotFound { address_id })
    }
}
