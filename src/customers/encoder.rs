//! Wire encoding of customers for stream consumers.

use thiserror::Error;

use crate::customers::model::Customer;

/// A customer could not be encoded for one consumer.
#[derive(Debug, Error)]
#[error("failed to encode customer {id}: {reason}")]
pub struct SerializationError {
    pub id: u64,
    pub reason: String,
}

/// Turns a customer into the text sent to a consumer.
pub trait CustomerEncoder: Send + Sync {
    fn encode(&self, customer: &Customer) -> Result<String, SerializationError>;
}

/// `{"id":N,"name":"..."}`
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl CustomerEncoder for JsonEncoder {
    fn encode(&self, customer: &Customer) -> Result<String, SerializationError> {
        serde_json::to_string(customer).map_err(|e| SerializationError {
            id: customer.id,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let customer = Customer {
            id: 1,
            name: "Yanis".into(),
        };
        assert_eq!(JsonEncoder.encode(&customer).unwrap(), r#"{"id":1,"name":"Yanis"}"#);
    }
}
