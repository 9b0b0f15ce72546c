use std::sync::Arc;

use ledger_common::Amount;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::PaystackConfig,
    data_objects::{InitializeData, InitializeRequest, PaystackResponse, VerifyData},
    PaystackApiError,
};

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for PaystackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaystackApi ({})", self.config.base_url)
    }
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PaystackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PaystackApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::RestResponseError(e.to_string()))?;
            Err(PaystackApiError::QueryError { status, message })
        }
    }

    /// Starts a transaction for `amount` minor units. Returns the checkout URL and Paystack's reference, which is
    /// `reference` echoed back.
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount: Amount,
        reference: &str,
    ) -> Result<InitializeData, PaystackApiError> {
        let body = InitializeRequest {
            email: email.to_string(),
            amount,
            reference: reference.to_string(),
            callback_url: self.config.callback_url.clone(),
        };
        debug!("Initializing Paystack transaction {reference} for {amount}");
        let res = self
            .rest_query::<PaystackResponse<InitializeData>, _>(Method::POST, "/transaction/initialize", Some(body))
            .await?;
        let data = unwrap_data(res)?;
        info!("Paystack transaction {} initialized", data.reference);
        Ok(data)
    }

    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifyData, PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying Paystack transaction {reference}");
        let res = self.rest_query::<PaystackResponse<VerifyData>, ()>(Method::GET, &path, None).await?;
        let data = unwrap_data(res)?;
        debug!("Paystack reports {reference} as {}", data.status);
        Ok(data)
    }
}

fn unwrap_data<T>(res: PaystackResponse<T>) -> Result<T, PaystackApiError> {
    match res {
        PaystackResponse { status: true, data: Some(data), .. } => Ok(data),
        PaystackResponse { status: true, data: None, .. } => {
            Err(PaystackApiError::RestResponseError("Response carried no data".into()))
        },
        PaystackResponse { status: false, message, .. } => Err(PaystackApiError::Declined(message)),
    }
}

#[cfg(test)]
mod test {
    use ledger_common::Secret;

    use super::*;

    #[test]
    fn urls() {
        let config = PaystackConfig::new("https://api.paystack.co/", Secret::new("sk_test_x".to_string()));
        let api = PaystackApi::new(config).unwrap();
        assert_eq!(api.url("/transaction/verify/tx_1"), "https://api.paystack.co/transaction/verify/tx_1");
        assert_eq!(format!("{api:?}"), "PaystackApi (https://api.paystack.co)");
    }

    #[test]
    fn declined_responses_are_errors() {
        let res = PaystackResponse::<VerifyData> { status: false, message: "Invalid key".into(), data: None };
        assert!(matches!(unwrap_data(res), Err(PaystackApiError::Declined(m)) if m == "Invalid key"));
    }

    #[test]
    fn bad_secret_key() {
        let config = PaystackConfig::new("https://api.paystack.co", Secret::new("sk\nlive".to_string()));
        assert!(matches!(PaystackApi::new(config), Err(PaystackApiError::Initialization(_))));
    }
}
