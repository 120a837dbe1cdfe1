use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    #[default]
    Consumable,
    NonConsumable,
    Subscription,
}

/// What the application registers with the storefront at initialization.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ProductDefinition {
    pub id: String,
    #[serde(rename = "type", default)]
    pub product_type: ProductType,
}

impl ProductDefinition {
    pub fn new(id: impl Into<String>, product_type: ProductType) -> Self {
        Self {
            id: id.into(),
            product_type,
        }
    }
}

/// Storefront-supplied product metadata. Read-only from the coordinator's side.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub available_to_purchase: bool,
    /// Price in minor currency units.
    pub price: i64,
    pub currency: String,
    pub price_string: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Product {
    /// A purchasable product with no localized metadata.
    pub fn new(product_id: impl Into<String>, product_type: ProductType) -> Self {
        Self {
            product_id: product_id.into(),
            available_to_purchase: true,
            price: 0,
            currency: String::new(),
            price_string: String::new(),
            title: String::new(),
            description: String::new(),
            product_type,
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_type_defaults_to_consumable() {
        let def: ProductDefinition = serde_json::from_str(r#"{"id":"gems"}"#).unwrap();
        assert_eq!(def.product_type, ProductType::Consumable);

        let def: ProductDefinition =
            serde_json::from_str(r#"{"id":"vip","type":"non_consumable"}"#).unwrap();
        assert_eq!(def, ProductDefinition::new("vip", ProductType::NonConsumable));
    }

    #[test]
    fn test_product_serializes_camel_case() {
        let product = Product::new("gems", ProductType::Consumable);
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["productId"], "gems");
        assert_eq!(json["availableToPurchase"], true);
        assert!(json.get("payload").is_none());
    }
}
