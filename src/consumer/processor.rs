//! Processor capability injected into the consumer.

use async_trait::async_trait;

use crate::contracts::{
    ConfigurationRequest, ConfigurationResponse, RemoveConfigurationRequest,
    RemoveConfigurationResponse,
};

/// Failure reported by a processor; the delivery is still acknowledged.
pub type ProcessorError = Box<dyn std::error::Error + Send + Sync>;

/// Handles each decoded contract shape.
///
/// Invoked one delivery at a time per consumer.
#[async_trait]
pub trait ConfigurationMessageProcessor: Send + Sync {
    async fn process_configuration_request(
        &self,
        request: ConfigurationRequest,
    ) -> Result<(), ProcessorError>;

    async fn process_configuration_response(
        &self,
        response: ConfigurationResponse,
    ) -> Result<(), ProcessorError>;

    async fn process_remove_configuration_request(
        &self,
        request: RemoveConfigurationRequest,
    ) -> Result<(), ProcessorError>;

    async fn process_remove_configuration_response(
        &self,
        response: RemoveConfigurationResponse,
    ) -> Result<(), ProcessorError>;
}

/// Logs every message it receives. Used by the `settix run` worker.
#[derive(Debug, Clone, Default)]
pub struct LoggingProcessor;

#[async_trait]
impl ConfigurationMessageProcessor for LoggingProcessor {
    async fn process_configuration_request(
        &self,
        request: ConfigurationRequest,
    ) -> Result<(), ProcessorError> {
        tracing::info!(
            tenant = %request.tenant,
            service_key = %request.service_key,
            keys = request.data.len(),
            timestamp = %request.timestamp,
            "Configuration request received"
        );
        Ok(())
    }

    async fn process_configuration_response(
        &self,
        response: ConfigurationResponse,
    ) -> Result<(), ProcessorError> {
        tracing::info!(
            tenant = %response.tenant,
            success = response.is_success,
            restart_required = response.is_restart_required,
            "Configuration response received"
        );
        Ok(())
    }

    async fn process_remove_configuration_request(
        &self,
        request: RemoveConfigurationRequest,
    ) -> Result<(), ProcessorError> {
        tracing::info!(
            tenant = %request.tenant,
            service_key = %request.service_key,
            keys = request.data.len(),
            restart_required = request.is_restart_required,
            "Remove configuration request received"
        );
        Ok(())
    }

    async fn process_remove_configuration_response(
        &self,
        response: RemoveConfigurationResponse,
    ) -> Result<(), ProcessorError> {
        tracing::info!(
            tenant = %response.tenant,
            success = response.is_success,
            "Remove configuration response received"
        );
        Ok(())
    }
}
