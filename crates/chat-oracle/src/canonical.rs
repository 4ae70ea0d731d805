//! Canonical form of a delivery.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::OracleError;

/// One message arriving at one recipient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// Who received it (any JSON value the test uses to name clients).
    pub client: Value,
    /// What arrived.
    pub msg: Value,
}

impl Delivery {
    /// Build from any serializable recipient and message.
    pub fn new(client: impl Serialize, msg: impl Serialize) -> Result<Self, OracleError> {
        Ok(Self {
            client: serde_json::to_value(client)?,
            msg: serde_json::to_value(msg)?,
        })
    }

    /// Compact JSON of `{"client", "msg"}`.
    ///
    /// Object keys come out sorted, so structurally equal deliveries share a key.
    pub fn canonical(&self) -> String {
        json!({ "client": self.client, "msg": self.msg }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::ChatMessage;

    #[test]
    fn field_order_does_not_matter() {
        let a = Delivery::new("client1", json!({"nick": "n", "text": "t"})).unwrap();
        let reordered: Value = serde_json::from_str(r#"{"text":"t","nick":"n"}"#).unwrap();
        let b = Delivery::new("client1", reordered).unwrap();
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn typed_and_untyped_messages_agree() {
        let typed = Delivery::new("client1", ChatMessage::new("n", "t")).unwrap();
        let raw = Delivery::new("client1", json!({"text": "t", "nick": "n"})).unwrap();
        assert_eq!(typed.canonical(), raw.canonical());
    }

    #[test]
    fn recipient_is_part_of_the_key() {
        let msg = ChatMessage::greeting("n");
        let a = Delivery::new("client1", &msg).unwrap();
        let b = Delivery::new("client2", &msg).unwrap();
        assert_ne!(a.canonical(), b.canonical());
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let d = Delivery::new("c", json!({"b": 1, "a": [true, null]})).unwrap();
        assert_eq!(d.canonical(), r#"{"client":"c","msg":{"a":[true,null],"b":1}}"#);
    }
}
