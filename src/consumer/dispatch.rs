//! Contract-identifier dispatch for a single delivery.
//!
//! # Data Flow
//! ```text
//! Delivery
//!     → settix-message-type header (missing → MissingContract)
//!     → ContractKind (unrecognised → UnknownContract)
//!     → decode body (malformed → Serialization)
//!     → processor method (error → Processing)
//!     → ack if the channel is open
//! ```
//!
//! # Design Decisions
//! - Every failure is logged with the base64 body and acknowledged
//! - Nothing is dead-lettered; poison messages are dropped

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::amqp::{Channel, Delivery, HeaderValue};
use crate::consumer::processor::{ConfigurationMessageProcessor, ProcessorError};
use crate::contracts::{
    ConfigurationRequest, ConfigurationResponse, Contract, ContractKind,
    RemoveConfigurationRequest, RemoveConfigurationResponse, MESSAGE_TYPE_HEADER,
};
use crate::observability::metrics::{self, DeliveryOutcome};

/// Why a delivery was dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Delivery has no settix-message-type header")]
    MissingContract,

    #[error("Unknown contract identifier {0:?}")]
    UnknownContract(String),

    #[error("Failed to decode {contract} body: {source}")]
    Serialization {
        contract: ContractKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Processor failed on {contract}: {source}")]
    Processing {
        contract: ContractKind,
        #[source]
        source: ProcessorError,
    },
}

impl DispatchError {
    /// Contract the delivery resolved to, if it got that far.
    pub fn contract(&self) -> Option<ContractKind> {
        match self {
            DispatchError::MissingContract | DispatchError::UnknownContract(_) => None,
            DispatchError::Serialization { contract, .. }
            | DispatchError::Processing { contract, .. } => Some(*contract),
        }
    }
}

/// Resolve the contract and hand the decoded payload to the processor.
pub async fn dispatch(
    delivery: &Delivery,
    processor: &dyn ConfigurationMessageProcessor,
) -> Result<ContractKind, DispatchError> {
    let id = delivery
        .header(MESSAGE_TYPE_HEADER)
        .and_then(HeaderValue::as_text)
        .ok_or(DispatchError::MissingContract)?;
    let kind = ContractKind::from_contract_id(&id)
        .ok_or_else(|| DispatchError::UnknownContract(id.into_owned()))?;

    let body = delivery.body.as_slice();
    let processed = match kind {
        ContractKind::ConfigurationRequest => {
            let message = decode::<ConfigurationRequest>(body)?;
            processor.process_configuration_request(message).await
        }
        ContractKind::ConfigurationResponse => {
            let message = decode::<ConfigurationResponse>(body)?;
            processor.process_configuration_response(message).await
        }
        ContractKind::RemoveConfigurationRequest => {
            let message = decode::<RemoveConfigurationRequest>(body)?;
            processor.process_remove_configuration_request(message).await
        }
        ContractKind::RemoveConfigurationResponse => {
            let message = decode::<RemoveConfigurationResponse>(body)?;
            processor.process_remove_configuration_response(message).await
        }
    };

    processed.map_err(|source| DispatchError::Processing {
        contract: kind,
        source,
    })?;
    Ok(kind)
}

fn decode<C: Contract>(body: &[u8]) -> Result<C, DispatchError> {
    C::decode(body).map_err(|source| DispatchError::Serialization {
        contract: C::KIND,
        source,
    })
}

/// Dispatch, log, record and acknowledge one delivery.
///
/// Never fails: processing errors are isolated to the delivery.
pub async fn handle_delivery(
    cluster: &str,
    channel: &dyn Channel,
    processor: &dyn ConfigurationMessageProcessor,
    delivery: Delivery,
) {
    match dispatch(&delivery, processor).await {
        Ok(kind) => {
            tracing::debug!(
                cluster = %cluster,
                delivery_tag = delivery.delivery_tag,
                contract = %kind,
                "Delivery processed"
            );
            metrics::record_delivery(kind.name(), DeliveryOutcome::Processed);
        }
        Err(e) => {
            let contract = e.contract().map_or("unknown", ContractKind::name);
            tracing::error!(
                cluster = %cluster,
                delivery_tag = delivery.delivery_tag,
                redelivered = delivery.redelivered,
                contract = contract,
                error = %e,
                body = %STANDARD.encode(&delivery.body),
                "Dropping undeliverable message"
            );
            metrics::record_delivery(contract, DeliveryOutcome::Dropped);
        }
    }

    if !channel.is_open() {
        tracing::warn!(
            cluster = %cluster,
            delivery_tag = delivery.delivery_tag,
            "Channel closed before ack; broker will redeliver"
        );
        return;
    }
    if let Err(e) = channel.ack(delivery.delivery_tag).await {
        tracing::warn!(
            cluster = %cluster,
            delivery_tag = delivery.delivery_tag,
            error = %e,
            "Failed to ack delivery"
        );
    }
}
