//! Messaging routes (/api/communication)
//!
//! - POST /api/communication/sms       - text the given number
//! - POST /api/communication/whatsapp  - WhatsApp the given number
//! - POST /api/communication/broadcast - fan a message out to farmers
//! - GET  /api/communication/templates - canned message texts
//! - GET  /api/communication/history   - the caller's outbound log
//!
//! Every dispatch, successful or not, is written to the communications
//! collection.

use bson::oid::ObjectId;
use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use hyper::{Method, Request, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::common::{
    json_body, json_response, ok, query_params, render, route_not_found, segments, under,
    HttpResponse, Page,
};
use super::views::CommunicationView;
use crate::auth::authenticate;
use crate::db::schemas::{Channel, CommunicationDoc, DeliveryStatus, FarmerDoc, Metadata};
use crate::server::AppState;
use crate::services::messaging::SentMessage;
use crate::store::FarmerFilter;
use crate::types::{FarmError, Result};
use crate::validation::{trimmed, Checks};

const PREFIX: &str = "/api/communication";
const DEFAULT_PAGE_SIZE: u64 = 10;
const SMS_MAX_CHARS: usize = 1600;
const WHATSAPP_MAX_CHARS: usize = 4096;
/// Gateway calls in flight per broadcast channel
const BROADCAST_CONCURRENCY: usize = 8;

pub async fn handle_communication_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::POST, ["sms"]) => direct(req, state, Channel::Sms).await,
        (&Method::POST, ["whatsapp"]) => direct(req, state, Channel::Whatsapp).await,
        (&Method::POST, ["broadcast"]) => broadcast(req, state).await,
        (&Method::GET, ["templates"]) => ok(&json!({ "templates": templates() })),
        (&Method::GET, ["history"]) => history(req, state).await,

        (_, ["sms"])
        | (_, ["whatsapp"])
        | (_, ["broadcast"])
        | (_, ["templates"])
        | (_, ["history"]) => Err(FarmError::MethodNotAllowed),
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

/// Map a gateway status onto the stored vocabulary
fn delivery_status(status: &str) -> DeliveryStatus {
    match status {
        "failed" | "undelivered" | "canceled" => DeliveryStatus::Failed,
        "queued" | "accepted" | "scheduled" | "sending" => DeliveryStatus::Queued,
        _ => DeliveryStatus::Sent,
    }
}

fn opted_in(farmer: &FarmerDoc, channel: Channel) -> bool {
    let notifications = &farmer.preferences.notifications;
    match channel {
        Channel::Sms => notifications.sms,
        Channel::Whatsapp => notifications.whatsapp,
        Channel::Email => notifications.email,
    }
}

fn log_entry(
    farmer_id: ObjectId,
    channel: Channel,
    from: String,
    to: String,
    body: &str,
    outcome: &Result<SentMessage>,
) -> CommunicationDoc {
    let (status, provider_sid, error, to) = match outcome {
        Ok(sent) => (
            delivery_status(&sent.status),
            Some(sent.sid.clone()),
            None,
            sent.to.clone(),
        ),
        Err(e) => (DeliveryStatus::Failed, None, Some(e.to_string()), to),
    };

    CommunicationDoc {
        _id: None,
        metadata: Metadata::new(),
        farmer_id,
        channel,
        to,
        from,
        body: body.to_string(),
        status,
        provider_sid,
        error,
        broadcast_id: None,
    }
}

// =============================================================================
// Direct messages
// =============================================================================

async fn direct(req: &Request<Bytes>, state: &AppState, channel: Channel) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    let (max_chars, label, key) = match channel {
        Channel::Whatsapp => (WHATSAPP_MAX_CHARS, "WhatsApp message", "whatsapp"),
        _ => (SMS_MAX_CHARS, "SMS", "sms"),
    };

    Checks::new(&body)
        .mobile_phone("to", "Valid phone number is required")
        .length(
            "message",
            1,
            max_chars,
            &format!("Message must be between 1 and {} characters", max_chars),
        )
        .finish()?;

    if !opted_in(&farmer, channel) {
        let name = if channel == Channel::Whatsapp { "WhatsApp" } else { "SMS" };
        return Err(FarmError::BadRequest(format!(
            "{} notifications are disabled for this account",
            name
        )));
    }

    let to = trimmed(&body, "to").unwrap_or_default();
    let message = trimmed(&body, "message").unwrap_or_default();

    let outcome = state.messenger.send(channel, &to, &message).await;
    let entry = log_entry(
        farmer.stored_id()?,
        channel,
        state.messenger.from_address(channel),
        to,
        &message,
        &outcome,
    );
    if let Err(e) = state.stores.communications.insert(entry).await {
        warn!(farmer = %farmer.id_hex(), "Failed to log outbound {}: {}", channel, e);
    }

    match outcome {
        Ok(sent) => {
            info!(farmer = %farmer.id_hex(), channel = %channel, sid = %sent.sid, "Message sent");
            let suffix = if state.messenger.is_demo() { " (demo mode)" } else { "" };
            ok(&json!({
                "message": format!("{} sent successfully{}", label, suffix),
                key: sent,
            }))
        }
        Err(e) => {
            error!(farmer = %farmer.id_hex(), channel = %channel, "Message dispatch failed: {}", e);
            Ok(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({
                    "message": format!("Failed to send {}", label),
                    "error": e.to_string(),
                }),
            ))
        }
    }
}

// =============================================================================
// Broadcast
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ChannelTally {
    channel: Channel,
    sent: u64,
    failed: u64,
    pending: u64,
}

fn broadcast_channels(body: &Value) -> Vec<Channel> {
    let mut channels = Vec::new();
    for channel in body
        .get("channels")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter_map(Channel::parse)
    {
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    channels
}

fn check_broadcast(body: &Value) -> Result<()> {
    let mut checks = Checks::new(body);
    checks.length(
        "message",
        1,
        SMS_MAX_CHARS,
        "Message must be between 1 and 1600 characters",
    );

    match body.get("channels").and_then(Value::as_array) {
        None => checks.fail("channels", "Channels must be an array"),
        Some(channels) => {
            for (i, channel) in channels.iter().enumerate() {
                if channel.as_str().and_then(Channel::parse).is_none() {
                    checks.fail(&format!("channels[{}]", i), "Invalid channel type");
                }
            }
        }
    }

    checks
        .optional_array("farmerIds", "Farmer IDs must be an array")
        .optional_object("criteria", "Criteria must be an object")
        .finish()
}

/// Active farmers named by `farmerIds`, else those matching `criteria`
fn recipient_filter(body: &Value) -> FarmerFilter {
    let mut filter = FarmerFilter::active();

    if let Some(ids) = body.get("farmerIds").and_then(Value::as_array) {
        filter.ids = Some(
            ids.iter()
                .filter_map(Value::as_str)
                .filter_map(|id| ObjectId::parse_str(id).ok())
                .collect(),
        );
        return filter;
    }

    filter.country = trimmed(body, "criteria.country").filter(|s| !s.is_empty());
    filter.state = trimmed(body, "criteria.state").filter(|s| !s.is_empty());
    filter.crop = trimmed(body, "criteria.crop").filter(|s| !s.is_empty());
    filter
}

/// Send to one broadcast recipient and build its log entry
async fn send_one(
    state: &AppState,
    channel: Channel,
    farmer_id: ObjectId,
    phone: String,
    message: &str,
    broadcast_id: &str,
) -> CommunicationDoc {
    let outcome = state.messenger.send(channel, &phone, message).await;
    let from = state.messenger.from_address(channel);
    let mut entry = log_entry(farmer_id, channel, from, phone, message, &outcome);
    entry.broadcast_id = Some(broadcast_id.to_string());
    entry
}

async fn dispatch_channel(
    state: &AppState,
    channel: Channel,
    recipients: &[FarmerDoc],
    message: &str,
    broadcast_id: &str,
) -> ChannelTally {
    let mut tally = ChannelTally {
        channel,
        sent: 0,
        failed: 0,
        pending: 0,
    };

    let reachable: Vec<(ObjectId, String)> = recipients
        .iter()
        .filter(|f| opted_in(f, channel))
        .filter_map(|f| f._id.map(|id| (id, f.phone.clone())))
        .collect();
    tally.failed = (recipients.len() - reachable.len()) as u64;

    if channel == Channel::Email {
        tally.pending = reachable.len() as u64;
        return tally;
    }

    let entries: Vec<CommunicationDoc> = stream::iter(reachable)
        .map(|(farmer_id, phone)| {
            send_one(state, channel, farmer_id, phone, message, broadcast_id)
        })
        .buffer_unordered(BROADCAST_CONCURRENCY)
        .collect()
        .await;

    for entry in entries {
        match entry.status {
            DeliveryStatus::Failed => tally.failed += 1,
            DeliveryStatus::Sent => tally.sent += 1,
            DeliveryStatus::Queued => tally.pending += 1,
        }
        if let Err(e) = state.stores.communications.insert(entry).await {
            warn!(broadcast = %broadcast_id, "Failed to log broadcast dispatch: {}", e);
        }
    }

    tally
}

async fn broadcast(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;
    check_broadcast(&body)?;

    let message = trimmed(&body, "message").unwrap_or_default();
    let recipients = state
        .stores
        .farmers
        .find_matching(&recipient_filter(&body))
        .await?;

    let now = Utc::now();
    let broadcast_id = format!("broadcast_{}", now.timestamp_millis());

    let mut channels = Vec::new();
    for channel in broadcast_channels(&body) {
        channels.push(dispatch_channel(state, channel, &recipients, &message, &broadcast_id).await);
    }

    info!(
        farmer = %farmer.id_hex(),
        broadcast = %broadcast_id,
        recipients = recipients.len(),
        "Broadcast dispatched"
    );

    ok(&json!({
        "message": "Broadcast message queued successfully",
        "results": {
            "totalRecipients": recipients.len(),
            "channels": channels,
            "messageId": broadcast_id,
            "createdAt": now,
        },
    }))
}

// =============================================================================
// Templates and history
// =============================================================================

#[derive(Debug, Serialize)]
struct Template {
    id: &'static str,
    name: &'static str,
    message: &'static str,
    channels: [Channel; 2],
}

const fn template(id: &'static str, name: &'static str, message: &'static str) -> Template {
    Template {
        id,
        name,
        message,
        channels: [Channel::Sms, Channel::Whatsapp],
    }
}

/// Canned texts by topic; `{placeholders}` are filled by the client
static TEMPLATES: &[(&str, [Template; 2])] = &[
    (
        "advisory",
        [
            template(
                "advisory_response",
                "Advisory Response",
                "Your agricultural advisory query has been processed. Check the app for detailed recommendations.",
            ),
            template(
                "urgent_advisory",
                "Urgent Advisory",
                "URGENT: Your crop shows signs of disease. Immediate action required. Check the app for treatment recommendations.",
            ),
        ],
    ),
    (
        "practices",
        [
            template(
                "practice_reminder",
                "Practice Reminder",
                "Reminder: Time to implement your adopted sustainable practice. Check the app for step-by-step guidance.",
            ),
            template(
                "practice_success",
                "Practice Success",
                "Congratulations! You have successfully implemented a sustainable practice. Keep up the great work!",
            ),
        ],
    ),
    (
        "gamification",
        [
            template(
                "level_up",
                "Level Up",
                "🎉 Congratulations! You have reached level {level} and earned {xp} XP. Keep farming sustainably!",
            ),
            template(
                "badge_earned",
                "Badge Earned",
                "🏆 You earned a new badge: {badge_name}! {badge_description}",
            ),
        ],
    ),
    (
        "weather",
        [
            template(
                "weather_alert",
                "Weather Alert",
                "Weather Alert: {weather_condition} expected in your area. Take necessary precautions for your crops.",
            ),
            template(
                "irrigation_reminder",
                "Irrigation Reminder",
                "Irrigation reminder: Based on weather conditions, your crops may need watering today.",
            ),
        ],
    ),
];

fn templates() -> Value {
    let groups = TEMPLATES
        .iter()
        .map(|(group, entries)| (group.to_string(), json!(entries)))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(groups)
}

async fn history(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let farmer_id = farmer.stored_id()?;
    let page = Page::from_query(&query_params(req), DEFAULT_PAGE_SIZE);

    let records = state
        .stores
        .communications
        .list_for_farmer(&farmer_id, page.skip(), page.limit_i64())
        .await?;
    let total = state
        .stores
        .communications
        .count_for_farmer(&farmer_id)
        .await?;

    let views: Vec<CommunicationView> = records.iter().map(CommunicationView::from).collect();
    ok(&json!({
        "communications": views,
        "pagination": page.pagination(total),
    }))
}
