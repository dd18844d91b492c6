//! # Telephony
//!
//! Outbound SMS and voice calls through the Twilio REST API.
//!
//! [`TelephonyGateway`] is the seam to the provider; [`TwilioGateway`] is the
//! production implementation. [`TelephonyService`] owns the phone numbers and
//! message formats used by the web routes.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub const DEFAULT_DRIVER_NUMBER: &str = "+17809722321";
pub const DEFAULT_VOICE_SCRIPT_URL: &str = "http://demo.twilio.com/docs/voice.xml";
pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Provider acknowledgement for a queued SMS.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MessageReceipt {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Provider acknowledgement for an initiated call.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CallReceipt {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    async fn send_sms(
        &self,
        to: &str,
        from: &str,
        body: &str,
    ) -> Result<MessageReceipt, TelephonyError>;

    async fn place_call(
        &self,
        to: &str,
        from: &str,
        voice_script_url: &str,
    ) -> Result<CallReceipt, TelephonyError>;
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Scheme and host of the REST API, e.g. `https://api.twilio.com`.
    pub api_base: String,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct ProviderError {
    message: String,
}

pub struct TwilioGateway {
    client: Client,
    account_url: Url,
    config: TwilioConfig,
}

impl std::fmt::Debug for TwilioGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioGateway")
            .field("account_url", &self.account_url.as_str())
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl TwilioGateway {
    pub fn new(config: TwilioConfig) -> Result<Self, TelephonyError> {
        let account_url = Url::parse(&config.api_base)
            .and_then(|base| {
                base.join(&format!(
                    "/2010-04-01/Accounts/{}/",
                    config.account_sid
                ))
            })
            .map_err(|e| {
                TelephonyError::Config(format!("Invalid API base '{}': {}", config.api_base, e))
            })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("taxi-server/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(%account_url, "created Twilio gateway");

        Ok(Self {
            client,
            account_url,
            config,
        })
    }

    async fn post_form<T>(&self, resource: &str, form: &[(&str, &str)]) -> Result<T, TelephonyError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self
            .account_url
            .join(resource)
            .map_err(|e| TelephonyError::Config(format!("Invalid URL: {}", e)))?;

        debug!(%url, "posting to telephony provider");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ProviderError>(&text)
                .map(|e| e.message)
                .unwrap_or(text);

            error!(status = status.as_u16(), %message, "telephony request rejected");
            Err(TelephonyError::Provider {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl TelephonyGateway for TwilioGateway {
    async fn send_sms(
        &self,
        to: &str,
        from: &str,
        body: &str,
    ) -> Result<MessageReceipt, TelephonyError> {
        self.post_form("Messages.json", &[("To", to), ("From", from), ("Body", body)])
            .await
    }

    async fn place_call(
        &self,
        to: &str,
        from: &str,
        voice_script_url: &str,
    ) -> Result<CallReceipt, TelephonyError> {
        self.post_form(
            "Calls.json",
            &[("To", to), ("From", from), ("Url", voice_script_url)],
        )
        .await
    }
}

/// Booking details submitted from the booking form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub name: String,
    pub phone: String,
    pub pickup_time: Option<String>,
    pub pickup_location: String,
    pub dropoff_location: String,
}

impl Booking {
    pub fn message_body(&self) -> String {
        let mut body = format!("New Booking:\nName: {}\nPhone: {}\n", self.name, self.phone);
        if let Some(time) = &self.pickup_time {
            body.push_str(&format!("Pick time: {}\n", time));
        }
        body.push_str(&format!(
            "Pickup: {}\nDropoff: {}",
            self.pickup_location, self.dropoff_location
        ));
        body
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub custom_message: String,
}

impl EmergencyRequest {
    pub fn message_body(&self) -> String {
        format!(
            "Emergency! User's location: https://maps.google.com/?q={},{}\nCustom Message: {}",
            self.latitude, self.longitude, self.custom_message
        )
    }
}

#[derive(Debug, Clone)]
pub struct PhoneBook {
    /// Sender number owned by the telephony account.
    pub from: String,
    pub driver: String,
    /// Receives emergency messages and calls.
    pub operator: String,
    pub voice_script_url: String,
}

#[derive(Clone)]
pub struct TelephonyService {
    gateway: Arc<dyn TelephonyGateway>,
    numbers: PhoneBook,
}

impl std::fmt::Debug for TelephonyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelephonyService")
            .field("numbers", &self.numbers)
            .finish_non_exhaustive()
    }
}

impl TelephonyService {
    pub fn new(gateway: Arc<dyn TelephonyGateway>, numbers: PhoneBook) -> Self {
        Self { gateway, numbers }
    }

    pub async fn send_booking_sms(&self, booking: &Booking) -> Result<MessageReceipt, TelephonyError> {
        let receipt = self
            .gateway
            .send_sms(&self.numbers.driver, &self.numbers.from, &booking.message_body())
            .await?;
        info!(sid = %receipt.sid, "booking SMS sent to driver");
        Ok(receipt)
    }

    pub async fn send_emergency_sms(
        &self,
        request: &EmergencyRequest,
    ) -> Result<MessageReceipt, TelephonyError> {
        let receipt = self
            .gateway
            .send_sms(&self.numbers.operator, &self.numbers.from, &request.message_body())
            .await?;
        info!(sid = %receipt.sid, "emergency SMS sent to operator");
        Ok(receipt)
    }

    pub async fn place_call(&self) -> Result<CallReceipt, TelephonyError> {
        let receipt = self
            .gateway
            .place_call(
                &self.numbers.operator,
                &self.numbers.from,
                &self.numbers.voice_script_url,
            )
            .await?;
        info!(sid = %receipt.sid, "call initiated");
        Ok(receipt)
    }
}
