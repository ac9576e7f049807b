//! Affiliate catalog entities: products and the deals attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product linked from articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Affiliate link.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A time-limited offer, optionally tied to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable fields of a [`Product`], as sent by the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Writable fields of a [`Deal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealInput {
    #[serde(default)]
    pub product_id: Option<Uuid>,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProductInput {
    /// Returns a human-readable reason when the input cannot be stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Product name must not be empty".into());
        }
        validate_link(&self.url)?;
        if matches!(self.price, Some(p) if !p.is_finite() || p < 0.0) {
            return Err("Price must be a non-negative number".into());
        }
        Ok(())
    }

    pub fn into_product(self, id: Uuid, created_at: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name.trim().to_string(),
            url: self.url,
            price: self.price,
            currency: self.currency,
            image_url: self.image_url,
            category: self.category,
            description: self.description,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

impl DealInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Deal title must not be empty".into());
        }
        validate_link(&self.url)?;
        if matches!(self.discount_percent, Some(d) if !(0.0..=100.0).contains(&d)) {
            return Err("Discount must be between 0 and 100".into());
        }
        Ok(())
    }

    pub fn into_deal(self, id: Uuid, created_at: DateTime<Utc>) -> Deal {
        Deal {
            id,
            product_id: self.product_id,
            title: self.title.trim().to_string(),
            url: self.url,
            discount_percent: self.discount_percent,
            expires_at: self.expires_at,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

fn validate_link(url: &str) -> Result<(), String> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(format!("Link must be an http(s) URL: {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_input() -> ProductInput {
        ProductInput {
            name: "Desk lamp".into(),
            url: "https://shop.example/lamp".into(),
            price: Some(29.9),
            currency: Some("EUR".into()),
            image_url: None,
            category: None,
            description: None,
        }
    }

    #[test]
    fn test_product_input_validation() {
        assert!(product_input().validate().is_ok());

        let mut bad = product_input();
        bad.name = "   ".into();
        assert!(bad.validate().is_err());

        let mut bad = product_input();
        bad.url = "javascript:alert(1)".into();
        assert!(bad.validate().is_err());

        let mut bad = product_input();
        bad.price = Some(-1.0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_deal_discount_range() {
        let deal = DealInput {
            product_id: None,
            title: "Spring sale".into(),
            url: "https://shop.example/sale".into(),
            discount_percent: Some(120.0),
            expires_at: None,
        };
        assert!(deal.validate().is_err());
    }

    #[test]
    fn test_into_product_keeps_creation_time() {
        let created = Utc::now() - chrono::Duration::days(3);
        let id = Uuid::new_v4();
        let product = product_input().into_product(id, created);
        assert_eq!(product.id, id);
        assert_eq!(product.created_at, created);
        assert!(product.updated_at > created);
    }
}
