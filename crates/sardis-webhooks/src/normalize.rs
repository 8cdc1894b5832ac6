use crate::error::WebhookError;
use chrono::{DateTime, Utc};
use sardis_lifecycle::{AchEvent, CardEvent, ChainEvent, RailEvent, ReturnCode};
use sardis_types::{PaymentId, ProviderEventId, Rail};
use serde::{Deserialize, Serialize};

/// Raw provider callback body shape shared by the supported providers.
#[derive(Debug, Clone, Deserialize)]
struct WebhookBody {
    event_id: String,
    payment_id: String,
    rail: Rail,
    #[serde(rename = "type")]
    event_type: String,
    return_code: Option<String>,
}

/// A verified, deduplicated, decoded provider event ready for the state
/// machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Internal row id assigned at admission.
    pub event_id: ProviderEventId,
    pub provider: String,
    /// Provider-assigned id, half of the dedupe key.
    pub external_id: String,
    pub payment_id: PaymentId,
    pub event: RailEvent,
    pub received_at: DateTime<Utc>,
}

/// Decode a raw body into the payment id and tagged rail event.
pub fn decode_body(raw_body: &[u8]) -> Result<(String, PaymentId, RailEvent), WebhookError> {
    let body: WebhookBody = serde_json::from_slice(raw_body)
        .map_err(|e| WebhookError::MalformedBody(e.to_string()))?;
    let payment_id = PaymentId::parse(body.payment_id.as_str())
        .map_err(|e| WebhookError::MalformedBody(e.to_string()))?;
    let event = decode_event(body.rail, &body.event_type, body.return_code.as_deref())?;
    Ok((body.event_id, payment_id, event))
}

fn decode_event(
    rail: Rail,
    event_type: &str,
    return_code: Option<&str>,
) -> Result<RailEvent, WebhookError> {
    let unknown = || WebhookError::UnknownEventType {
        rail: rail.to_string(),
        event_type: event_type.to_string(),
    };

    match rail {
        Rail::Ach => {
            let event = match event_type {
                "ORIGINATION_INITIATED" => AchEvent::OriginationInitiated,
                "REVIEWED" => AchEvent::Reviewed,
                "PROCESSED" => AchEvent::Processed,
                "SETTLED" => AchEvent::Settled,
                "RELEASED" => AchEvent::Released,
                "ACH_RETURN_INITIATED" => AchEvent::ReturnInitiated {
                    return_code: ReturnCode::parse(return_code.ok_or_else(|| {
                        WebhookError::MalformedBody(
                            "ACH_RETURN_INITIATED requires return_code".to_string(),
                        )
                    })?),
                },
                "RETURNED" => AchEvent::Returned,
                "DECLINED" => AchEvent::Declined,
                "VOIDED" => AchEvent::Voided,
                "REVERSED" => AchEvent::Reversed,
                "EXPIRED" => AchEvent::Expired,
                _ => return Err(unknown()),
            };
            Ok(RailEvent::Ach(event))
        }
        Rail::Card => {
            let event = match event_type {
                "CAPTURED" => CardEvent::Captured,
                "REVERSED" => CardEvent::Reversed,
                "DECLINED" => CardEvent::Declined,
                "EXPIRED" => CardEvent::Expired,
                _ => return Err(unknown()),
            };
            Ok(RailEvent::Card(event))
        }
        Rail::OnChain | Rail::Stablecoin => {
            let event = match event_type {
                "INCLUDED" => ChainEvent::Included,
                "CONFIRMED" => ChainEvent::Confirmed,
                "FAILED" => ChainEvent::Failed,
                "REPLACED" => ChainEvent::Replaced,
                _ => return Err(unknown()),
            };
            Ok(RailEvent::Chain(event))
        }
    }
}
