use super::{
    ChargeRequest, GatewayCustomer, GatewayError, PaymentGateway, PaymentIntent, PaymentMethod,
    SetupIntent,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

/// HTTP client for the payment provider's form-encoded REST API,
/// authenticated with the account's secret key.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

/// Provider error envelope: `{"error": {"message": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    code: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
        } else {
            Err(Self::api_error(status, response.text().await?))
        }
    }

    fn api_error(status: StatusCode, body: String) -> GatewayError {
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => GatewayError::Api {
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| "payment provider error".to_string()),
                code: envelope.error.code,
                status: status.as_u16(),
            },
            Err(_) => GatewayError::Api {
                message: format!("payment provider returned HTTP {}", status.as_u16()),
                code: None,
                status: status.as_u16(),
            },
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, GatewayError> {
        debug!(path, "payment provider request");
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        debug!(path, "payment provider request");
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self))]
    async fn create_customer(
        &self,
        email: &str,
        user_id: Uuid,
    ) -> Result<GatewayCustomer, GatewayError> {
        self.post_form(
            "/customers",
            &[
                ("email".to_string(), email.to_string()),
                ("metadata[user_id]".to_string(), user_id.to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn create_setup_intent(&self, customer_id: &str) -> Result<SetupIntent, GatewayError> {
        self.post_form(
            "/setup_intents",
            &[
                ("customer".to_string(), customer_id.to_string()),
                ("payment_method_types[]".to_string(), "card".to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, GatewayError> {
        self.get(&format!("/payment_methods/{}", payment_method_id))
            .await
    }

    #[instrument(skip(self))]
    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError> {
        let _: PaymentMethod = self
            .post_form(
                &format!("/payment_methods/{}/attach", payment_method_id),
                &[("customer".to_string(), customer_id.to_string())],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError> {
        let _: GatewayCustomer = self
            .post_form(
                &format!("/customers/{}", customer_id),
                &[(
                    "invoice_settings[default_payment_method]".to_string(),
                    payment_method_id.to_string(),
                )],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_and_confirm_payment_intent(
        &self,
        request: ChargeRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.post_form(
            "/payment_intents",
            &[
                ("amount".to_string(), request.amount_minor.to_string()),
                ("currency".to_string(), request.currency.clone()),
                ("customer".to_string(), request.customer_id.clone()),
                (
                    "payment_method".to_string(),
                    request.payment_method_id.clone(),
                ),
                ("off_session".to_string(), "true".to_string()),
                ("confirm".to_string(), "true".to_string()),
                (
                    "metadata[order_id]".to_string(),
                    request.order_id.to_string(),
                ),
            ],
        )
        .await
    }
}
