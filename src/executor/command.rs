//! Description of one logical storage operation.

use crate::error::{ServiceError, StorageError, TransferError};
use crate::location::{CommandLocationMode, StorageLocation, StorageUri};
use crate::operation::{OperationContext, RequestResult};
use crate::signing::{AnonymousSigner, RequestSigner};
use crate::transport::{BodyStream, HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{ready, Stream};
use md5::{Digest, Md5};
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use url::Url;

/// Builds the HTTP request of an attempt from the chosen endpoint, the server
/// timeout and the operation context.
pub type BuildRequestFn = Box<
    dyn Fn(&Url, Option<Duration>, &OperationContext) -> Result<HttpRequest, StorageError>
        + Send
        + Sync,
>;

/// Interprets the status and headers of a response.
pub type PreprocessFn<T> = Box<
    dyn Fn(&HttpResponse, &RequestResult, &OperationContext) -> Result<T, StorageError>
        + Send
        + Sync,
>;

/// Interprets the body of a response that passed preprocessing.
pub type PostprocessFn<T> = Box<
    dyn Fn(
            HttpResponse,
            RequestResult,
            BodyDescriptor,
            OperationContext,
        ) -> BoxFuture<'static, Result<T, StorageError>>
        + Send
        + Sync,
>;

/// Decides whether the command can be prepared for another attempt.
pub type RecoverRequestFn = Box<dyn Fn(&RequestResult, &OperationContext) -> bool + Send + Sync>;

/// Request body of a command.
pub enum RequestBody {
    /// In-memory body, resent unchanged on every attempt.
    Buffered(Bytes),
    /// One-shot stream. It can be sent once; an operation whose stream was consumed
    /// by a failed attempt cannot be retried.
    Stream {
        /// The stream, until an attempt takes it.
        stream: Mutex<Option<BodyStream>>,
        /// Body length, if known.
        length: Option<u64>,
    },
}

impl RequestBody {
    /// In-memory body.
    pub fn buffered(body: impl Into<Bytes>) -> Self {
        RequestBody::Buffered(body.into())
    }

    /// One-shot streamed body.
    pub fn stream<S>(stream: S, length: Option<u64>) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static,
    {
        RequestBody::Stream {
            stream: Mutex::new(Some(Box::new(stream))),
            length,
        }
    }

    /// Body length, if known.
    pub fn len(&self) -> Option<u64> {
        match self {
            RequestBody::Buffered(bytes) => Some(bytes.len() as u64),
            RequestBody::Stream { length, .. } => *length,
        }
    }

    /// Returns true for a known-empty body.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Returns true if the body can still be sent.
    pub fn is_rewindable(&self) -> bool {
        match self {
            RequestBody::Buffered(_) => true,
            RequestBody::Stream { stream, .. } => stream.lock().is_some(),
        }
    }

    pub(crate) fn take_for_attempt(&self, chunk_size: usize) -> Result<AttemptBody, StorageError> {
        match self {
            RequestBody::Buffered(bytes) => Ok(AttemptBody::Buffered(bytes.clone())),
            RequestBody::Stream { stream, .. } => {
                let stream = stream
                    .lock()
                    .take()
                    .ok_or(StorageError::from(TransferError::BodyNotRewindable))?;
                Ok(AttemptBody::Stream(Box::new(Rechunk::new(stream, chunk_size))))
            }
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            RequestBody::Stream { length, .. } => f
                .debug_struct("Stream")
                .field("length", length)
                .field("rewindable", &self.is_rewindable())
                .finish(),
        }
    }
}

pub(crate) enum AttemptBody {
    Buffered(Bytes),
    Stream(BodyStream),
}

pin_project! {
    /// Splits stream chunks larger than the configured buffer size.
    pub(crate) struct Rechunk<S> {
        #[pin]
        inner: S,
        pending: Bytes,
        chunk_size: usize,
    }
}

impl<S> Rechunk<S> {
    pub(crate) fn new(inner: S, chunk_size: usize) -> Self {
        Self {
            inner,
            pending: Bytes::new(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<S> Stream for Rechunk<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if !this.pending.is_empty() {
                let n = (*this.chunk_size).min(this.pending.len());
                return Poll::Ready(Some(Ok(this.pending.split_to(n))));
            }
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => *this.pending = chunk,
                other => return Poll::Ready(other),
            }
        }
    }
}

/// Length and optional MD5 of a response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyDescriptor {
    length: u64,
    md5: Option<String>,
}

impl BodyDescriptor {
    /// Describe a body, computing its base64 MD5 when asked.
    pub fn from_body(body: &[u8], calculate_md5: bool) -> Self {
        Self {
            length: body.len() as u64,
            md5: calculate_md5.then(|| STANDARD.encode(Md5::digest(body))),
        }
    }

    /// Body length in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Base64 MD5 of the body, if it was computed.
    pub fn md5(&self) -> Option<&str> {
        self.md5.as_deref()
    }
}

/// Preprocessing that accepts any 2xx response and rejects everything else with
/// a [`ServiceError`].
pub fn check_success(response: &HttpResponse, result: &RequestResult) -> Result<(), StorageError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ServiceError::from_result(result.clone()).into())
    }
}

/// One logical operation: how to build, sign and interpret each attempt.
pub struct StorageCommand<T> {
    uri: StorageUri,
    location_mode: CommandLocationMode,
    location_hint: Option<StorageLocation>,
    body: Option<RequestBody>,
    build_request: BuildRequestFn,
    signer: Arc<dyn RequestSigner>,
    preprocess: PreprocessFn<T>,
    postprocess: Option<PostprocessFn<T>>,
    recover_request: Option<RecoverRequestFn>,
    calculate_response_md5: bool,
}

impl<T> StorageCommand<T> {
    /// Create a primary-only, unsigned command.
    pub fn new<B, P>(uri: StorageUri, build_request: B, preprocess: P) -> Self
    where
        B: Fn(&Url, Option<Duration>, &OperationContext) -> Result<HttpRequest, StorageError>
            + Send
            + Sync
            + 'static,
        P: Fn(&HttpResponse, &RequestResult, &OperationContext) -> Result<T, StorageError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            uri,
            location_mode: CommandLocationMode::PrimaryOnly,
            location_hint: None,
            body: None,
            build_request: Box::new(build_request),
            signer: Arc::new(AnonymousSigner),
            preprocess: Box::new(preprocess),
            postprocess: None,
            recover_request: None,
            calculate_response_md5: false,
        }
    }

    /// Set the signer applied to every attempt.
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Set the replica restriction.
    pub fn with_location_mode(mut self, mode: CommandLocationMode) -> Self {
        self.location_mode = mode;
        self
    }

    /// Prefer `location` for the first attempt, e.g. the location of a continuation
    /// token.
    pub fn with_location_hint(mut self, location: StorageLocation) -> Self {
        if location != StorageLocation::Unspecified {
            self.location_hint = Some(location);
        }
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the body interpretation step.
    pub fn with_postprocess<F>(mut self, postprocess: F) -> Self
    where
        F: Fn(
                HttpResponse,
                RequestResult,
                BodyDescriptor,
                OperationContext,
            ) -> BoxFuture<'static, Result<T, StorageError>>
            + Send
            + Sync
            + 'static,
    {
        self.postprocess = Some(Box::new(postprocess));
        self
    }

    /// Set the hook consulted before a retry.
    pub fn with_recover_request<F>(mut self, recover: F) -> Self
    where
        F: Fn(&RequestResult, &OperationContext) -> bool + Send + Sync + 'static,
    {
        self.recover_request = Some(Box::new(recover));
        self
    }

    /// Compute the MD5 of response bodies for postprocessing.
    pub fn with_response_md5(mut self, calculate: bool) -> Self {
        self.calculate_response_md5 = calculate;
        self
    }

    /// Resource endpoints.
    pub fn uri(&self) -> &StorageUri {
        &self.uri
    }

    /// Replica restriction.
    pub fn location_mode(&self) -> CommandLocationMode {
        self.location_mode
    }

    /// Preferred first location.
    pub fn location_hint(&self) -> Option<StorageLocation> {
        self.location_hint
    }

    /// Request body.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub(crate) fn build_request(
        &self,
        uri: &Url,
        server_timeout: Option<Duration>,
        context: &OperationContext,
    ) -> Result<HttpRequest, StorageError> {
        (self.build_request)(uri, server_timeout, context)
    }

    pub(crate) fn signer(&self) -> &dyn RequestSigner {
        self.signer.as_ref()
    }

    pub(crate) fn preprocess(
        &self,
        response: &HttpResponse,
        result: &RequestResult,
        context: &OperationContext,
    ) -> Result<T, StorageError> {
        (self.preprocess)(response, result, context)
    }

    pub(crate) fn postprocess(&self) -> Option<&PostprocessFn<T>> {
        self.postprocess.as_ref()
    }

    pub(crate) fn recover_request(&self, result: &RequestResult, context: &OperationContext) -> bool {
        self.recover_request
            .as_ref()
            .map(|recover| recover(result, context))
            .unwrap_or(true)
    }

    pub(crate) fn calculate_response_md5(&self) -> bool {
        self.calculate_response_md5
    }
}

impl<T> fmt::Debug for StorageCommand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCommand")
            .field("uri", &self.uri)
            .field("location_mode", &self.location_mode)
            .field("location_hint", &self.location_hint)
            .field("body", &self.body)
            .field("postprocess", &self.postprocess.is_some())
            .finish_non_exhaustive()
    }
}
