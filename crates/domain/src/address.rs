//! Saved shipping addresses.

use common::{AddressId, UserId};
use serde::{Deserialize, Serialize};

use crate::order::ShippingAddress;

/// An address saved in a user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: Option<String>,
    pub country: String,
}

impl Address {
    /// Copies the address into an order-owned snapshot.
    pub fn snapshot(&self) -> ShippingAddress {
        ShippingAddress {
            recipient: self.recipient.clone(),
            phone: self.phone.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }
}
