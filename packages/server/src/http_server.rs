use crate::broadcast::BroadcastHub;
use crate::state::AppState;
use crate::telephony::{Booking, EmergencyRequest};
use crate::views::{
    self, AboutTemplate, BookingTemplate, CommentsTemplate, ContactTemplate, LandingTemplate,
};
use crate::{AppError, Result};
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Form, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::json;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
pub struct FeedbackForm {
    pub rating: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub comment: Option<String>,
}

/// Every field is optional so a missing one can be reported by name.
#[derive(Debug, Default, Deserialize)]
pub struct BookingForm {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub pickup_time: Option<String>,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
}

impl BookingForm {
    pub fn into_booking(self) -> Result<Booking> {
        fn required(value: Option<String>, field: &'static str) -> Result<String> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or(AppError::MissingField(field))
        }

        Ok(Booking {
            name: required(self.name, "name")?,
            phone: required(self.phone, "phone")?,
            pickup_time: self.pickup_time.filter(|t| !t.trim().is_empty()),
            pickup_location: required(self.pickup_location, "pickup_location")?,
            dropoff_location: required(self.dropoff_location, "dropoff_location")?,
        })
    }
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>> {
    let feedback = state.store.list_feedback().await?;
    let comments = state.store.list_comments().await?;
    views::render(&LandingTemplate::new(&feedback, &comments))
}

async fn submit_feedback_handler(
    State(state): State<AppState>,
    Form(form): Form<FeedbackForm>,
) -> Result<Redirect> {
    state
        .store
        .submit_feedback(form.rating.as_deref(), form.comments.as_deref())
        .await?;
    Ok(Redirect::to("/"))
}

async fn comments_page_handler(State(state): State<AppState>) -> Result<Html<String>> {
    let comments = state.store.list_comments().await?;
    views::render(&CommentsTemplate {
        comments: &comments,
    })
}

async fn post_comment_handler(
    State(state): State<AppState>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect> {
    state.store.submit_comment(form.comment.as_deref()).await?;
    Ok(Redirect::to("/"))
}

async fn submit_comment_handler(
    State(state): State<AppState>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect> {
    state.store.submit_comment(form.comment.as_deref()).await?;
    Ok(Redirect::to("/comments"))
}

async fn booking_page_handler() -> Result<Html<String>> {
    views::render(&BookingTemplate)
}

async fn book_handler(
    State(state): State<AppState>,
    Form(form): Form<BookingForm>,
) -> Result<Redirect> {
    let booking = form.into_booking()?;
    state.telephony.send_booking_sms(&booking).await?;
    info!(customer = %booking.name, "booking forwarded to driver");
    Ok(Redirect::to("/"))
}

async fn emergency_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EmergencyRequest>, JsonRejection>,
) -> Result<Response> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected emergency request");
            return Ok((
                rejection.status(),
                Json(json!({
                    "message": "Invalid emergency request",
                    "error": rejection.body_text(),
                })),
            )
                .into_response());
        }
    };
    warn!(
        latitude = request.latitude,
        longitude = request.longitude,
        "emergency message requested"
    );
    state.telephony.send_emergency_sms(&request).await?;
    Ok(Json(json!({ "status": "Emergency message sent successfully!" })).into_response())
}

async fn make_call_handler(State(state): State<AppState>) -> Response {
    match state.telephony.place_call().await {
        Ok(receipt) => Json(json!({
            "message": "Call initiated!",
            "sid": receipt.sid,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "call could not be placed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Error initiating call",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn about_handler() -> Result<Html<String>> {
    views::render(&AboutTemplate)
}

async fn contact_handler() -> Result<Html<String>> {
    views::render(&ContactTemplate)
}

async fn health_check_handler() -> Html<&'static str> {
    Html("OK")
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    debug!("new WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, app_state.hub))
}

async fn handle_socket(socket: WebSocket, hub: BroadcastHub) {
    let mut subscription = hub.subscribe();
    let client_id = subscription.id;
    info!(%client_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(msg_to_send) = subscription.recv().await {
            let json_msg = match serde_json::to_string(&msg_to_send) {
                Ok(json_msg) => json_msg,
                Err(e) => {
                    error!(%client_id, error = %e, "failed to encode update");
                    continue;
                }
            };
            if sender.send(Message::Text(json_msg.into())).await.is_err() {
                debug!(%client_id, "send failed, closing send task");
                break;
            }
        }
    });

    // Clients only listen; incoming frames are drained until close.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => {
                    debug!(%client_id, "client sent close frame");
                    break;
                }
                Message::Text(text) => {
                    debug!(%client_id, text = text.as_str(), "ignoring client message")
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    hub.unsubscribe(&client_id);
    info!(%client_id, "WebSocket client disconnected");
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/submit_feedback", post(submit_feedback_handler))
        .route(
            "/comments",
            get(comments_page_handler).post(post_comment_handler),
        )
        .route("/submit", post(submit_comment_handler))
        .route("/booking", get(booking_page_handler))
        .route("/book", post(book_handler))
        .route("/send-emergency-message", post(emergency_handler))
        .route("/make_call", post(make_call_handler))
        .route("/about", get(about_handler))
        .route("/contact", get(contact_handler).post(contact_handler))
        .route("/health", get(health_check_handler))
        .route("/ws", get(websocket_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_form_reports_first_missing_field() {
        let form = BookingForm {
            name: Some("Alex".into()),
            phone: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(form.into_booking(), Err(AppError::MissingField("phone"))));
    }

    #[test]
    fn blank_pickup_time_is_dropped() {
        let form = BookingForm {
            name: Some("Alex".into()),
            phone: Some("555-0100".into()),
            pickup_time: Some(String::new()),
            pickup_location: Some("Main St".into()),
            dropoff_location: Some("5th Ave".into()),
        };
        let booking = form.into_booking().unwrap();
        assert_eq!(booking.pickup_time, None);
        assert_eq!(booking.dropoff_location, "5th Ave");
    }
}
