//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CouponId, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::{
    OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentOutcome, ShippingAddress,
    StatusHistoryEntry,
};

/// Everything needed to place a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub discount: Money,
    pub coupon_id: Option<CouponId>,
    pub shipping_price: Money,
    pub payment_method: PaymentMethod,
    pub placed_at: DateTime<Utc>,
}

/// Persisted order header, used to rehydrate an [`Order`] from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address: ShippingAddress,
    pub subtotal: Money,
    pub discount: Money,
    pub coupon_id: Option<CouponId>,
    pub shipping_price: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order aggregate root.
///
/// Owns its line items and its status history. The latest history entry
/// always carries the order's current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    header: OrderHeader,
    items: Vec<OrderItem>,
    history: Vec<StatusHistoryEntry>,
}

impl Order {
    /// Places a new order in `Pending` with its initial history entry.
    ///
    /// Totals are computed here from the snapshotted line items and never
    /// taken from the caller.
    pub fn place(new: NewOrder) -> Result<Self, OrderError> {
        if new.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        for item in &new.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id,
                    price: item.unit_price.cents(),
                });
            }
        }

        let subtotal: Money = new.items.iter().map(OrderItem::total_price).sum();
        if new.discount.is_negative() || new.discount > subtotal {
            return Err(OrderError::InvalidDiscount {
                discount: new.discount,
                subtotal,
            });
        }

        let total = subtotal - new.discount + new.shipping_price;
        let initial = StatusHistoryEntry::new(
            new.id,
            OrderStatus::Pending,
            Some("Order placed".to_string()),
            new.placed_at,
        );

        Ok(Self {
            header: OrderHeader {
                id: new.id,
                user_id: new.user_id,
                shipping_address: new.shipping_address,
                subtotal,
                discount: new.discount,
                coupon_id: new.coupon_id,
                shipping_price: new.shipping_price,
                total,
                payment_method: new.payment_method,
                status: OrderStatus::Pending,
                created_at: new.placed_at,
                updated_at: new.placed_at,
            },
            items: new.items,
            history: vec![initial],
        })
    }

    /// Rebuilds an order from persisted parts.
    pub fn rehydrate(
        header: OrderHeader,
        items: Vec<OrderItem>,
        history: Vec<StatusHistoryEntry>,
    ) -> Self {
        debug_assert_eq!(
            history.last().map(|entry| entry.status),
            Some(header.status),
            "latest history entry must match the order status"
        );
        Self {
            header,
            items,
            history,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.header.id
    }

    pub fn user_id(&self) -> UserId {
        self.header.user_id
    }

    pub fn header(&self) -> &OrderHeader {
        &self.header
    }

    pub fn status(&self) -> OrderStatus {
        self.header.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn history(&self) -> &[StatusHistoryEntry] {
        &self.history
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.header.shipping_address
    }

    pub fn subtotal(&self) -> Money {
        self.header.subtotal
    }

    pub fn discount(&self) -> Money {
        self.header.discount
    }

    pub fn coupon_id(&self) -> Option<CouponId> {
        self.header.coupon_id
    }

    pub fn shipping_price(&self) -> Money {
        self.header.shipping_price
    }

    pub fn total(&self) -> Money {
        self.header.total
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.header.payment_method
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.header.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.header.updated_at
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

// Transition methods (return the history entry to record)
impl Order {
    /// Decides what a payment outcome does to this order.
    ///
    /// Returns `Ok(None)` when the order already holds the outcome's status,
    /// so redelivered notifications change nothing.
    pub fn record_payment(
        &self,
        outcome: PaymentOutcome,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<StatusHistoryEntry>, OrderError> {
        let target = outcome.target_status();

        if self.header.status == target {
            return Ok(None);
        }

        if !self.header.status.awaits_payment() {
            return Err(OrderError::InvalidStatusTransition {
                current: self.header.status,
                requested: target,
            });
        }

        Ok(Some(StatusHistoryEntry::new(
            self.header.id,
            target,
            note,
            at,
        )))
    }

    /// Moves the order along the admin-driven fulfillment path.
    pub fn change_status(
        &self,
        next: OrderStatus,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<StatusHistoryEntry, OrderError> {
        if !self.header.status.can_advance_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                current: self.header.status,
                requested: next,
            });
        }

        Ok(StatusHistoryEntry::new(self.header.id, next, note, at))
    }

    /// Applies a recorded transition.
    pub fn apply(&mut self, entry: StatusHistoryEntry) {
        self.header.status = entry.status;
        self.header.updated_at = entry.recorded_at;
        self.history.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient: "Ada Lovelace".to_string(),
            phone: "+201000000000".to_string(),
            street: "12 Nile St".to_string(),
            city: "Cairo".to_string(),
            region: "Cairo".to_string(),
            postal_code: Some("11511".to_string()),
            country: "EG".to_string(),
        }
    }

    fn new_order(items: Vec<OrderItem>, discount: Money) -> NewOrder {
        NewOrder {
            id: OrderId::new(),
            user_id: UserId::new(),
            shipping_address: address(),
            items,
            discount,
            coupon_id: None,
            shipping_price: Money::from_cents(5000),
            payment_method: PaymentMethod::Card,
            placed_at: Utc::now(),
        }
    }

    fn placed_order() -> Order {
        let items = vec![
            OrderItem::new(ProductId::new(), "Widget", 2, Money::from_cents(10_000)),
            OrderItem::new(ProductId::new(), "Gadget", 1, Money::from_cents(2_500)),
        ];
        Order::place(new_order(items, Money::from_cents(1_000))).unwrap()
    }

    #[test]
    fn test_place_computes_totals() {
        let order = placed_order();

        assert_eq!(order.subtotal().cents(), 22_500);
        assert_eq!(order.discount().cents(), 1_000);
        assert_eq!(order.total().cents(), 22_500 - 1_000 + 5_000);
        assert_eq!(order.total_quantity(), 3);
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_place_records_initial_history() {
        let order = placed_order();

        assert_eq!(order.history().len(), 1);
        assert_eq!(order.history()[0].status, OrderStatus::Pending);
        assert_eq!(order.history()[0].order_id, order.id());
    }

    #[test]
    fn test_place_without_items_fails() {
        let result = Order::place(new_order(vec![], Money::zero()));
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn test_place_with_zero_quantity_fails() {
        let items = vec![OrderItem::new(
            ProductId::new(),
            "Widget",
            0,
            Money::from_cents(1000),
        )];
        let result = Order::place(new_order(items, Money::zero()));
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_place_with_discount_above_subtotal_fails() {
        let items = vec![OrderItem::new(
            ProductId::new(),
            "Widget",
            1,
            Money::from_cents(1000),
        )];
        let result = Order::place(new_order(items, Money::from_cents(1001)));
        assert!(matches!(result, Err(OrderError::InvalidDiscount { .. })));
    }

    #[test]
    fn test_successful_payment_completes_order() {
        let mut order = placed_order();

        let entry = order
            .record_payment(PaymentOutcome::Succeeded, Some("txn 42".into()), Utc::now())
            .unwrap()
            .unwrap();
        order.apply(entry);

        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.history().len(), 2);
        assert_eq!(order.history().last().unwrap().status, order.status());
    }

    #[test]
    fn test_repeated_payment_outcome_is_noop() {
        let mut order = placed_order();
        let entry = order
            .record_payment(PaymentOutcome::Declined, None, Utc::now())
            .unwrap()
            .unwrap();
        order.apply(entry);

        let again = order
            .record_payment(PaymentOutcome::Declined, None, Utc::now())
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_conflicting_payment_outcome_rejected() {
        let mut order = placed_order();
        let entry = order
            .record_payment(PaymentOutcome::Declined, None, Utc::now())
            .unwrap()
            .unwrap();
        order.apply(entry);

        let result = order.record_payment(PaymentOutcome::Succeeded, None, Utc::now());
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition {
                current: OrderStatus::Failed,
                requested: OrderStatus::Completed,
            })
        ));
    }

    #[test]
    fn test_full_fulfillment_lifecycle() {
        let mut order = placed_order();
        let paid = order
            .record_payment(PaymentOutcome::Succeeded, None, Utc::now())
            .unwrap()
            .unwrap();
        order.apply(paid);

        for next in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let entry = order.change_status(next, None, Utc::now()).unwrap();
            order.apply(entry);
            assert_eq!(order.status(), next);
        }

        assert!(order.status().is_terminal());
        assert_eq!(order.history().len(), 5);
    }

    #[test]
    fn test_cannot_ship_unpaid_order() {
        let order = placed_order();
        let result = order.change_status(OrderStatus::Shipped, None, Utc::now());
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_cancelled_order_is_dead_end() {
        let mut order = placed_order();
        let entry = order
            .change_status(OrderStatus::Cancelled, Some("customer request".into()), Utc::now())
            .unwrap();
        order.apply(entry);

        assert!(order
            .record_payment(PaymentOutcome::Succeeded, None, Utc::now())
            .is_err());
        assert!(order
            .change_status(OrderStatus::Processing, None, Utc::now())
            .is_err());
    }

    #[test]
    fn test_serialization() {
        let order = placed_order();
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, order);
    }
}
