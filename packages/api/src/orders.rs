//! Customer orders.

use otadash_query::{Mutation, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::{Patch, Resource, Update};

const ORDERS: Resource = Resource::new("orders", "/orders");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "crate::models::string_or_number")]
    pub id: String,
    pub order_number: String,
    pub merchant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_wilaya: String,
    pub customer_address: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub delivery_price: f64,
    pub total: f64,
    /// `pending`, `confirmed`, `shipped`, `delivered` or `cancelled`.
    pub status: String,
    /// `unpaid` or `paid`.
    pub payment_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Order {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

pub fn list() -> Query<Vec<Order>> {
    ORDERS.list()
}

pub fn get(id: &str) -> Query<Order> {
    ORDERS.get(id)
}

pub fn create() -> Mutation<Patch, Order> {
    ORDERS.create()
}

pub fn update() -> Mutation<Update<Patch>, Order> {
    ORDERS.update()
}

pub fn delete() -> Mutation<String, Value> {
    ORDERS.delete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::client;
    use otadash_http::mock::MockExecutor;
    use serde_json::json;

    #[tokio::test]
    async fn reads_order_with_items() {
        let executor = MockExecutor::new().with_response(
            "/orders/o-17",
            MockExecutor::success_response(json!({
                "id": "o-17",
                "order_number": "ORD-0017",
                "merchant_id": "m1",
                "customer_name": "Amina",
                "customer_phone": "+213555000111",
                "customer_wilaya": "Oran",
                "customer_address": "12 rue Larbi Ben M'hidi",
                "items": [
                    {"product_id": "p1", "name": "Oak table", "price": 12500.0, "quantity": 1},
                    {"product_id": "p2", "name": "Chair", "price": 3000.0, "quantity": 4}
                ],
                "subtotal": 24500.0,
                "delivery_price": 600.0,
                "total": 25100.0,
                "status": "pending",
                "payment_status": "unpaid",
                "payment_method": "cash_on_delivery",
                "created_at": "2024-03-01T00:00:00Z",
                "updated_at": "2024-03-01T00:00:00Z"
            })),
        );
        let client = client(&executor);

        let order = client.fetch(&get("o-17")).await.unwrap().unwrap();

        assert_eq!(order.item_count(), 5);
        assert_eq!(order.payment_method.as_deref(), Some("cash_on_delivery"));
    }

    #[tokio::test]
    async fn empty_id_is_not_fetched() {
        let executor = MockExecutor::new();
        let client = client(&executor);

        assert_eq!(client.fetch(&get("")).await.unwrap(), None);
        assert_eq!(executor.request_count(), 0);
    }
}
