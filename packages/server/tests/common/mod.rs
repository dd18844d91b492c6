//! Test server and telephony doubles shared by the integration tests.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taxi_server::{
    db::Store,
    http_server::create_router,
    models::Taxi,
    state::AppState,
    telephony::{
        CallReceipt, MessageReceipt, PhoneBook, TelephonyError, TelephonyGateway,
        TelephonyService,
    },
    BroadcastHub,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

pub const DRIVER: &str = "+17809722321";
pub const OPERATOR: &str = "+15550111";
pub const SENDER: &str = "+15550199";
pub const VOICE_URL: &str = "http://demo.twilio.com/docs/voice.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub from: String,
    pub body: String,
}

/// Accepts every request and remembers what was sent.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    pub sms: Mutex<Vec<SentSms>>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    pub fn sent(&self) -> Vec<SentSms> {
        self.sms.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelephonyGateway for RecordingGateway {
    async fn send_sms(
        &self,
        to: &str,
        from: &str,
        body: &str,
    ) -> Result<MessageReceipt, TelephonyError> {
        let mut sms = self.sms.lock().unwrap();
        sms.push(SentSms {
            to: to.into(),
            from: from.into(),
            body: body.into(),
        });
        Ok(MessageReceipt {
            sid: format!("SM{}", sms.len()),
            status: Some("queued".into()),
        })
    }

    async fn place_call(
        &self,
        to: &str,
        _from: &str,
        voice_script_url: &str,
    ) -> Result<CallReceipt, TelephonyError> {
        self.calls
            .lock()
            .unwrap()
            .push((to.into(), voice_script_url.into()));
        Ok(CallReceipt {
            sid: "CA123".into(),
            status: Some("queued".into()),
        })
    }
}

/// Rejects every request the way the provider rejects a bad number.
#[derive(Debug, Default)]
pub struct FailingGateway;

pub const PROVIDER_ERROR: &str = "The 'To' number is not a valid phone number.";

#[async_trait]
impl TelephonyGateway for FailingGateway {
    async fn send_sms(&self, _: &str, _: &str, _: &str) -> Result<MessageReceipt, TelephonyError> {
        Err(TelephonyError::Provider {
            status: 400,
            message: PROVIDER_ERROR.into(),
        })
    }

    async fn place_call(&self, _: &str, _: &str, _: &str) -> Result<CallReceipt, TelephonyError> {
        Err(TelephonyError::Provider {
            status: 400,
            message: PROVIDER_ERROR.into(),
        })
    }
}

pub fn phone_book() -> PhoneBook {
    PhoneBook {
        from: SENDER.into(),
        driver: DRIVER.into(),
        operator: OPERATOR.into(),
        voice_script_url: VOICE_URL.into(),
    }
}

#[derive(Debug)]
pub struct TestServer {
    pub base_url: String,
    pub store: Store,
    pub hub: BroadcastHub,
    pub taxi_tx: watch::Sender<Taxi>,
    client: Client,
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

impl TestServer {
    pub async fn start(gateway: Arc<dyn TelephonyGateway>) -> Self {
        let store = Store::connect("sqlite::memory:", 1)
            .await
            .expect("in-memory store");
        let (taxi_tx, taxi_rx) = watch::channel(Taxi::default());
        let hub = BroadcastHub::new(taxi_rx);

        let app = create_router(AppState {
            store: store.clone(),
            hub: hub.clone(),
            telephony: TelephonyService::new(gateway, phone_book()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server failed to start");
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .expect("client");

        Self {
            base_url: format!("http://{addr}"),
            store,
            hub,
            taxi_tx,
            client,
            handle,
            shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("request failed")
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.replacen("http://", "ws://", 1), path)
    }

    pub async fn get_accepting(&self, path: &str, encoding: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(reqwest::header::ACCEPT_ENCODING, encoding)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
    }
}

pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
