use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::observability::metrics::get_metrics;
use crate::resilience::{CallOutcome, FailureReason, ResilientCaller};
use crate::vendor::{PopReply, SlotCounts, VendorClient, CABINET_ENDPOINT, COMMAND_ENDPOINT};

pub const FIRST_SLOT: u8 = 1;
pub const LAST_SLOT: u8 = 6;

/// A battery the vendor agreed to release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotResult {
    pub slot: u8,
    pub lock_id: Option<String>,
    pub battery_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("invalid slot number {0}, must be between {FIRST_SLOT} and {LAST_SLOT}")]
    InvalidSlot(i64),
    #[error("token not available")]
    TokenUnavailable,
    #[error("vendor rejected the token")]
    Unauthorized,
    #[error("{0}")]
    Vendor(FailureReason),
    #[error("vendor declined to release slot {0}")]
    Declined(u8),
}

impl From<FailureReason> for DispatchError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::TokenUnavailable => DispatchError::TokenUnavailable,
            other => DispatchError::Vendor(other),
        }
    }
}

fn settle<T>(outcome: CallOutcome<T>) -> Result<T, DispatchError> {
    match outcome {
        CallOutcome::Success(body) => Ok(body),
        CallOutcome::AuthFailure => Err(DispatchError::Unauthorized),
        CallOutcome::OtherFailure(reason) => Err(reason.into()),
    }
}

/// Station-level commands on top of the vendor API; every vendor call goes
/// through the shared `ResilientCaller`.
#[derive(Clone)]
pub struct StationCommandDispatcher {
    caller: ResilientCaller,
    vendor: VendorClient,
}

impl StationCommandDispatcher {
    pub fn new(caller: ResilientCaller, vendor: VendorClient) -> Self {
        Self { caller, vendor }
    }

    pub fn caller(&self) -> &ResilientCaller {
        &self.caller
    }

    pub async fn get_slots(&self, station_id: &str) -> Result<SlotCounts, DispatchError> {
        let body = settle(
            self.caller
                .call(CABINET_ENDPOINT, |token| {
                    let vendor = self.vendor.clone();
                    async move { vendor.query_cabinet(station_id, &token).await }
                })
                .await,
        )?;

        Ok(SlotCounts::from_cabinet_body(&body).unwrap_or_else(|| {
            warn!("no position info found for station {}", station_id);
            SlotCounts::default()
        }))
    }

    /// `slot` is checked against 1..=6 before anything touches the network.
    pub async fn pop_slot(&self, station_id: &str, slot: i64) -> Result<SlotResult, DispatchError> {
        let slot = u8::try_from(slot)
            .ok()
            .filter(|s| (FIRST_SLOT..=LAST_SLOT).contains(s))
            .ok_or(DispatchError::InvalidSlot(slot))?;

        let result = self.pop_valid_slot(station_id, slot).await;
        get_metrics()
            .await
            .pop_results
            .with_label_values(&[if result.is_ok() { "released" } else { "failed" }])
            .inc();
        result
    }

    /// Pops slots 1..=6 one after another. A failing slot does not stop the
    /// rest; only released slots are returned, in slot order.
    pub async fn pop_all(&self, station_id: &str) -> Result<Vec<SlotResult>, DispatchError> {
        if self.caller.current_token().await.is_none() {
            return Err(DispatchError::TokenUnavailable);
        }

        let mut released = Vec::with_capacity(LAST_SLOT as usize);
        for slot in FIRST_SLOT..=LAST_SLOT {
            match self.pop_slot(station_id, i64::from(slot)).await {
                Ok(result) => released.push(result),
                Err(e) => warn!("station {} slot {} not popped: {}", station_id, slot, e),
            }
        }
        info!("station {}: {} of {} slots popped", station_id, released.len(), LAST_SLOT);
        Ok(released)
    }

    async fn pop_valid_slot(&self, station_id: &str, slot: u8) -> Result<SlotResult, DispatchError> {
        let body = settle(
            self.caller
                .call(COMMAND_ENDPOINT, |token| {
                    let vendor = self.vendor.clone();
                    async move { vendor.send_pop_command(station_id, slot, &token).await }
                })
                .await,
        )?;

        let reply = PopReply::from_body(&body);
        if !reply.borrowed {
            return Err(DispatchError::Declined(slot));
        }
        Ok(SlotResult {
            slot,
            lock_id: reply.lock_id,
            battery_id: reply.battery_id,
        })
    }
}
