//! Request execution with retries and replica failover.
//!
//! The [`Executor`] runs a [`StorageCommand`] to completion. Each attempt is
//! built, signed, observed, sent and interpreted; on failure the operation's retry
//! policy decides whether to try again, where, and after how long. The executor
//! enforces the location rules of the command, the operation deadline, and the
//! one-shot nature of streamed bodies.

mod command;

pub use command::{
    check_success, BodyDescriptor, BuildRequestFn, PostprocessFn, PreprocessFn, RecoverRequestFn,
    RequestBody, StorageCommand,
};

use crate::config::RequestOptions;
use crate::error::{RequestError, StorageError, TransferError};
use crate::location::{initial_location, resolve_location_mode, StorageLocation};
use crate::operation::{ClientLogLevel, OperationContext, RequestResult};
use crate::resilience::RetryContext;
use crate::transport::HttpTransport;
use chrono::Utc;
use command::AttemptBody;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, info_span, warn};
use tracing_futures::Instrument;

/// Header carrying the operation's client request ID.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Runs storage commands over a transport.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn HttpTransport>,
}

impl Executor {
    /// Create an executor over `transport`.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Run `command` to completion.
    ///
    /// `options` must already carry the client defaults (see
    /// [`RequestOptions::merge`]); unset values fall back to library defaults.
    /// One [`RequestResult`] is appended to `context` per physical attempt.
    pub async fn execute<T>(
        &self,
        command: StorageCommand<T>,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
    {
        if context.start_time().is_none() {
            context.set_start_time(Utc::now());
        }

        let span = info_span!(
            "storage_operation",
            client_request_id = %context.client_request_id()
        );
        let outcome = self.run(&command, options, context).instrument(span).await;
        context.set_end_time(Utc::now());

        match &outcome {
            Ok(_) => {
                if context.should_log(ClientLogLevel::Informational) {
                    info!(
                        client_request_id = %context.client_request_id(),
                        attempts = context.request_result_count(),
                        "Operation completed successfully"
                    );
                }
            }
            Err(e) => {
                if context.should_log(ClientLogLevel::Error) {
                    error!(
                        client_request_id = %context.client_request_id(),
                        attempts = context.request_result_count(),
                        error = %e,
                        "Operation failed"
                    );
                }
            }
        }
        outcome
    }

    async fn run<T>(
        &self,
        command: &StorageCommand<T>,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
    {
        let started = Instant::now();
        let deadline = options.maximum_execution_time().map(|max| started + max);
        let mut policy = options.retry_policy().clone_policy();

        let mut location_mode =
            resolve_location_mode(options.location_mode(), command.location_mode())?;
        let mut location = initial_location(location_mode, command.location_hint());
        let mut retry_count: u32 = 0;
        let mut last_error: Option<StorageError> = None;

        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(timeout_error(started, context, last_error));
                }
            }

            location_mode = resolve_location_mode(location_mode, command.location_mode())?;
            if !location_mode.permits(location) {
                location = location_mode.first_location();
            }
            command.uri().validate(location_mode)?;

            let error = match self
                .attempt(command, options, context, location, deadline)
                .await
            {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            let Some(last_result) = error.request_result().cloned() else {
                return Err(error);
            };

            let next_location = location_mode.next_location(location);
            let retry_context =
                RetryContext::new(retry_count, last_result.clone(), next_location, location_mode);
            retry_count += 1;

            let retry_info = policy.evaluate(&retry_context, context);
            if !retry_info.should_retry() {
                if context.should_log(ClientLogLevel::Warning) {
                    warn!(
                        client_request_id = %context.client_request_id(),
                        status = ?last_result.http_status_code(),
                        error = %error,
                        "Retry policy did not allow for a retry"
                    );
                }
                return Err(error);
            }

            location = match retry_info.target_location() {
                StorageLocation::Unspecified => next_location,
                target => target,
            };
            if let Some(mode) = retry_info.updated_location_mode() {
                location_mode = mode;
            }

            if let Some(body) = command.body() {
                if !body.is_rewindable() {
                    return Err(StorageError::Transfer {
                        source: TransferError::BodyNotRewindable,
                        result: Some(Box::new(last_result)),
                    });
                }
            }

            if !command.recover_request(&last_result, context) {
                return Err(StorageError::Transfer {
                    source: TransferError::RecoveryDeclined,
                    result: Some(Box::new(last_result)),
                });
            }

            let delay = retry_info.retry_interval();
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    return Err(timeout_error(started, context, Some(error)));
                }
            }

            if context.should_log(ClientLogLevel::Warning) {
                warn!(
                    client_request_id = %context.client_request_id(),
                    retry_count = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    next_location = %location,
                    location_mode = ?location_mode,
                    error = %error,
                    "Retrying failed operation"
                );
            }

            if !delay.is_zero() {
                sleep(delay).await;
            }
            last_error = Some(error);
        }
    }

    async fn attempt<T>(
        &self,
        command: &StorageCommand<T>,
        options: &RequestOptions,
        context: &OperationContext,
        location: StorageLocation,
        deadline: Option<Instant>,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
    {
        let start_time = Utc::now();
        let uri = command
            .uri()
            .location_uri(location)
            .ok_or(RequestError::MissingLocationUri { location })?;

        let mut request = command.build_request(uri, options.server_timeout(), context)?;
        request.set_header(CLIENT_REQUEST_ID_HEADER, context.client_request_id());
        for (name, value) in context.user_headers() {
            request.set_header(name, value);
        }
        if let Some(deadline) = deadline {
            request.timeout = Some(deadline.saturating_duration_since(Instant::now()));
        }

        let body = match command.body() {
            Some(body) => Some(body.take_for_attempt(options.http_buffer_size())?),
            None => None,
        };
        if let Some(AttemptBody::Buffered(bytes)) = &body {
            request.body = Some(bytes.clone());
        }

        let request = command.signer().sign(request, context).await?;

        if let Some(hook) = context.sending_request_hook() {
            if context.should_log(ClientLogLevel::Verbose) {
                debug!(
                    client_request_id = %context.client_request_id(),
                    "Invoking sending request hook"
                );
            }
            hook(&request, context);
        }

        if context.should_log(ClientLogLevel::Informational) {
            info!(
                client_request_id = %context.client_request_id(),
                method = %request.method,
                url = %request.url,
                location = %location,
                "Starting request"
            );
        }

        let sent = match body {
            Some(AttemptBody::Stream(stream)) => {
                self.transport.send_streaming(request.clone(), stream).await
            }
            _ => self.transport.send(request.clone()).await,
        };

        let response = match sent {
            Ok(response) => response,
            // Rejected before anything went on the wire: not an attempt.
            Err(e) if !matches!(e, StorageError::Network { .. }) => return Err(e),
            Err(e) => {
                let result = RequestResult::transport_failure(start_time, location);
                context.add_request_result(result.clone());
                if context.should_log(ClientLogLevel::Warning) {
                    warn!(
                        client_request_id = %context.client_request_id(),
                        location = %location,
                        error = %e,
                        "Request failed without a response"
                    );
                }
                return Err(e.with_request_result(result));
            }
        };

        let result = RequestResult::from_response(start_time, location, &response);
        context.add_request_result(result.clone());

        if let Some(hook) = context.response_received_hook() {
            hook(&request, &response, context);
        }

        if context.should_log(ClientLogLevel::Informational) {
            info!(
                client_request_id = %context.client_request_id(),
                status = response.status,
                request_id = ?result.service_request_id(),
                location = %location,
                "Response received"
            );
        }

        let value = command
            .preprocess(&response, &result, context)
            .map_err(|e| e.with_request_result(result.clone()))?;

        match command.postprocess() {
            None => Ok(value),
            Some(postprocess) => {
                let descriptor =
                    BodyDescriptor::from_body(&response.body, command.calculate_response_md5());
                postprocess(response, result.clone(), descriptor, context.clone())
                    .await
                    .map_err(|e| e.with_request_result(result))
            }
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

fn timeout_error(
    started: Instant,
    context: &OperationContext,
    last_error: Option<StorageError>,
) -> StorageError {
    StorageError::Timeout {
        elapsed: started.elapsed(),
        result: context.last_request_result().map(Box::new),
        last_error: last_error.map(Box::new),
    }
}
