//! Amazon Bedrock runtime client.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_bedrockruntime::config::retry::RetryConfig;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use super::{EventStream, InvocationError, ModelInvoker, StreamEvent, TransportError};
use crate::config::UpstreamConfig;
use crate::proxy::types::ModelInvocationParameters;

const CREDENTIALS_PROVIDER_NAME: &str = "bedrock-relay-config";

/// Opens `InvokeModelWithResponseStream` calls through a shared SDK client.
#[derive(Clone)]
pub struct BedrockInvoker {
    client: Client,
}

impl BedrockInvoker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the client from the AWS default chain plus config overrides.
    ///
    /// With `verify_credentials` set, credentials are resolved here so a
    /// misconfigured process exits at startup instead of failing requests.
    pub async fn from_config(upstream: &UpstreamConfig) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(upstream.region.clone()));

        if let Some(profile) = &upstream.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(creds) = &upstream.credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.expose_secret().to_string(),
                creds
                    .session_token
                    .as_ref()
                    .map(|token| token.expose_secret().to_string()),
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));
        }
        if let Some(url) = &upstream.endpoint_url {
            loader = loader.endpoint_url(url);
        }

        let sdk_config = loader.load().await;

        if upstream.verify_credentials {
            let provider = sdk_config
                .credentials_provider()
                .ok_or_else(|| anyhow::anyhow!("No AWS credentials provider configured"))?;
            provider.provide_credentials().await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to resolve AWS credentials: {}",
                    DisplayErrorContext(&e)
                )
            })?;
            tracing::info!("AWS credentials resolved");
        }

        let mut builder = aws_sdk_bedrockruntime::config::Builder::from(&sdk_config);
        if let Some(attempts) = upstream.max_attempts {
            builder = builder.retry_config(RetryConfig::standard().with_max_attempts(attempts));
        }

        tracing::info!(
            region = %upstream.region,
            endpoint = ?upstream.endpoint_url,
            "Bedrock runtime client ready"
        );

        Ok(Self::new(Client::from_conf(builder.build())))
    }
}

/// Map an SDK stream member onto the relay's closed event type.
fn translate_event(event: ResponseStream) -> StreamEvent {
    match event {
        ResponseStream::Chunk(part) => StreamEvent::Chunk(
            part.bytes
                .map(|blob| Bytes::from(blob.into_inner()))
                .unwrap_or_default(),
        ),
        // `Unknown` is a non-exhaustive variant, so it needs the struct pattern.
        ResponseStream::Unknown { .. } => StreamEvent::Unknown,
        other => StreamEvent::Error(format!("{:?}", other)),
    }
}

#[async_trait]
impl ModelInvoker for BedrockInvoker {
    async fn open_stream(
        &self,
        params: &ModelInvocationParameters,
    ) -> Result<EventStream, InvocationError> {
        let body = params.body()?;

        let output = self
            .client
            .invoke_model_with_response_stream()
            .model_id(&params.model_id)
            .content_type(&params.content_type)
            .accept(&params.accept)
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                let cause = DisplayErrorContext(&e).to_string();
                tracing::error!(model = %params.model_id, error = %cause, "Failed to invoke model");
                InvocationError::Rejected(cause)
            })?;

        tracing::debug!(model = %params.model_id, "Model response stream opened");

        // `None` once the receiver has failed, so nothing polls it again.
        let events = stream::unfold(Some(output.body), |receiver| async move {
            let Some(mut receiver) = receiver else {
                return None;
            };
            match receiver.recv().await {
                Ok(Some(event)) => Some((Ok(translate_event(event)), Some(receiver))),
                Ok(None) => None,
                Err(e) => Some((
                    Err(TransportError::new(DisplayErrorContext(&e).to_string())),
                    None,
                )),
            }
        });

        Ok(events.boxed())
    }
}
