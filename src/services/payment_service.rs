use crate::utils::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
pub const CURRENCY: &str = "usd";

/// External service that opens a payment intent and hands back the client
/// secret the browser completes the charge with.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_intent(&self, amount_cents: i64, currency: &str) -> Result<String, AppError>;
}

/// Converts a price in dollars to the smallest currency unit.
pub fn amount_cents(price: f64) -> Result<i64, AppError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::InvalidRequest(format!("price must be a positive amount, got {}", price)));
    }
    let cents = (price * 100.0).round();
    if cents < 1.0 || cents > i64::MAX as f64 {
        return Err(AppError::InvalidRequest(format!("price out of range: {}", price)));
    }
    Ok(cents as i64)
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    client_secret: String,
}

pub struct StripeProvider {
    client: reqwest::Client,
    secret: String,
}

impl StripeProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), secret: secret.into() }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_intent(&self, amount_cents: i64, currency: &str) -> Result<String, AppError> {
        let amount = amount_cents.to_string();
        let response = self
            .client
            .post(format!("{}/payment_intents", STRIPE_API_BASE))
            .bearer_auth(&self.secret)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", currency),
                ("payment_method_types[]", "card"),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::PaymentProvider(format!("Stripe API error: {}", response.status())));
        }

        let intent: StripeIntent = response
            .json()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("unexpected response: {}", e)))?;
        Ok(intent.client_secret)
    }
}

/// Used when no payment secret is configured.
pub struct DisabledProvider;

#[async_trait]
impl PaymentProvider for DisabledProvider {
    async fn create_intent(&self, _amount_cents: i64, _currency: &str) -> Result<String, AppError> {
        Err(AppError::PaymentProvider("payments are not configured".to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_rounds_to_cents() {
        assert_eq!(amount_cents(19.99).unwrap(), 1999);
        assert_eq!(amount_cents(0.01).unwrap(), 1);
        assert_eq!(amount_cents(10.5).unwrap(), 1050);
        assert_eq!(amount_cents(120.0).unwrap(), 12000);
    }

    #[test]
    fn test_amount_rejects_bad_prices() {
        for price in [0.0, -5.0, f64::NAN, f64::INFINITY, 0.001] {
            assert!(matches!(amount_cents(price), Err(AppError::InvalidRequest(_))), "{price}");
        }
    }

    #[tokio::test]
    async fn test_disabled_provider_reports_provider_error() {
        let result = DisabledProvider.create_intent(100, CURRENCY).await;
        assert!(matches!(result, Err(AppError::PaymentProvider(_))));
    }
}
