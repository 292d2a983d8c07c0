//! Request DTOs for the demo API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for `POST /orders`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub item: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl CreateOrderRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.item.trim().is_empty() {
            return Some("Item cannot be empty".to_string());
        }
        if self.quantity == 0 {
            return Some("Quantity must be at least 1".to_string());
        }
        None
    }
}

/// Request body for `POST /payments/:id`
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_request_default_quantity() {
        let req: CreateOrderRequest = serde_json::from_str(r#"{"item": "book"}"#).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_empty_item() {
        let req = CreateOrderRequest {
            item: "  ".to_string(),
            quantity: 1,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_zero_quantity() {
        let req = CreateOrderRequest {
            item: "book".to_string(),
            quantity: 0,
        };
        assert!(req.validate().is_some());
    }
}
