//! The cancellable unit of work representing one in-flight request.
//!
//! # State Machine
//! ```text
//! Pending → Executing → {Completed | Failed | Retrying | Cancelled}
//! Retrying → Executing (re-enters the queue, competes for a slot)
//! any non-terminal → Cancelled, observed at the next suspension point
//! ```
//!
//! # Design Decisions
//! - Completion fires exactly once, for Completed, Failed and Cancelled
//! - Cancellation after the response but before decode skips decode and
//!   transform entirely
//! - Request-build failures are terminal (they would repeat identically),
//!   transport failures and non-2xx statuses consult the retry policy
//! - The attempt count has no cap in the core; the policy is the gate

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::service::client::{build_transport_request, ClientShared};
use crate::service::definition::{
    DispatchPriority, QueuePriority, RequestDefinition, ServiceResult,
};
use crate::service::error::ServiceError;
use crate::service::policy::AuthChallenge;
use crate::service::value::{ServiceResponse, ServiceValue};
use crate::transport::TransportRequest;

/// Optional post-decode hook: maps the decoded body to the final value
/// handed to completion. An error here fails the operation.
pub type TransformFn = Box<
    dyn FnOnce(&ServiceResponse, ServiceValue) -> Result<ServiceValue, ServiceError> + Send,
>;

/// Finalization callback. Invoked exactly once per operation.
pub type CompletionFn =
    Box<dyn FnOnce(ServiceResult, Option<ServiceResponse>, Option<ServiceValue>) + Send>;

/// Lifecycle states of a [`ServiceOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Executing,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed | OperationState::Cancelled
        )
    }
}

/// What the queue should do with the operation after one attempt.
pub(crate) enum RunOutcome {
    Finished,
    Requeue(Duration),
}

enum AttemptOutcome {
    Response(ServiceResponse, Bytes),
    TransportError(ServiceError),
    FatalError(ServiceError),
    Cancelled,
}

/// One asynchronous request: definition, retry state, callbacks, and a
/// non-owning back-reference to the client whose queue runs it.
pub struct ServiceOperation {
    id: Uuid,
    definition: RequestDefinition,
    queue_priority: QueuePriority,
    dispatch_priority: DispatchPriority,
    context: Option<Box<dyn Any + Send + Sync>>,
    state: Mutex<OperationState>,
    attempts: AtomicU32,
    cancel: CancellationToken,
    transform: Mutex<Option<TransformFn>>,
    completion: Mutex<Option<CompletionFn>>,
    client: Weak<ClientShared>,
}

impl fmt::Debug for ServiceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceOperation")
            .field("id", &self.id)
            .field("url", &self.definition.url)
            .field("method", &self.definition.method)
            .field("state", &self.state())
            .field("attempts", &self.attempts.load(Ordering::SeqCst))
            .finish()
    }
}

impl ServiceOperation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        definition: RequestDefinition,
        queue_priority: QueuePriority,
        dispatch_priority: DispatchPriority,
        transform: Option<TransformFn>,
        completion: CompletionFn,
        context: Option<Box<dyn Any + Send + Sync>>,
        client: Weak<ClientShared>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition,
            queue_priority,
            dispatch_priority,
            context,
            state: Mutex::new(OperationState::Pending),
            attempts: AtomicU32::new(0),
            cancel,
            transform: Mutex::new(transform),
            completion: Mutex::new(Some(completion)),
            client,
        }
    }

    /// Correlation id carried in every log event for this operation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn definition(&self) -> &RequestDefinition {
        &self.definition
    }

    pub fn state(&self) -> OperationState {
        *self.state.lock().expect("operation state mutex poisoned")
    }

    /// Attempts started so far (0 until the first attempt executes).
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn queue_priority(&self) -> QueuePriority {
        self.queue_priority
    }

    pub fn dispatch_priority(&self) -> DispatchPriority {
        self.dispatch_priority
    }

    /// The opaque context value supplied at submission, if any.
    pub fn context<T: 'static>(&self) -> Option<&T> {
        self.context.as_ref()?.downcast_ref()
    }

    /// Request cancellation. Cooperative: observed at the next suspension
    /// point; an in-flight transfer is aborted through the transport.
    pub fn cancel(&self) {
        tracing::debug!(id = %self.id, "operation cancellation requested");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn set_state(&self, next: OperationState) {
        let mut state = self.state.lock().expect("operation state mutex poisoned");
        tracing::trace!(id = %self.id, from = ?*state, to = ?next, "state transition");
        *state = next;
    }

    /// Invoke the completion callback. The `Option` take makes a second
    /// call a no-op, so completion can never fire twice.
    fn complete(
        &self,
        result: ServiceResult,
        response: Option<ServiceResponse>,
        value: Option<ServiceValue>,
    ) {
        let completion = self
            .completion
            .lock()
            .expect("operation completion mutex poisoned")
            .take();
        if let Some(completion) = completion {
            tracing::debug!(
                id = %self.id,
                result = result.code(),
                dispatch = ?self.dispatch_priority,
                "operation finished"
            );
            completion(result, response, value);
        }
    }

    pub(crate) fn finish_cancelled(&self) {
        self.set_state(OperationState::Cancelled);
        self.complete(ServiceResult::Cancelled, None, None);
    }

    fn finish_failed(
        &self,
        shared: &ClientShared,
        error: ServiceError,
        response: Option<ServiceResponse>,
        value: Option<ServiceValue>,
    ) {
        self.set_state(OperationState::Failed);
        tracing::warn!(
            id = %self.id,
            url = %self.definition.url,
            error = %error,
            "operation failed"
        );
        shared.policy.operation_failed(self, &error);
        self.complete(ServiceResult::Failed, response, value);
    }

    /// Execute one attempt. Called by a queue worker; the returned
    /// outcome tells the worker whether to re-enqueue for retry.
    pub(crate) async fn run(&self) -> RunOutcome {
        let Some(shared) = self.client.upgrade() else {
            self.finish_cancelled();
            return RunOutcome::Finished;
        };
        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return RunOutcome::Finished;
        }

        self.set_state(OperationState::Executing);
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            id = %self.id,
            attempt,
            method = self.definition.method.as_str(),
            url = %self.definition.url,
            "attempt starting"
        );

        shared.policy.operation_did_begin(self);
        let outcome = self.execute_attempt(&shared).await;
        shared.policy.operation_did_end(self);

        match outcome {
            AttemptOutcome::Cancelled => {
                self.finish_cancelled();
                RunOutcome::Finished
            }
            AttemptOutcome::Response(response, body) => {
                self.handle_response(&shared, response, body, attempt)
            }
            AttemptOutcome::TransportError(error) => {
                if self.cancel.is_cancelled() {
                    self.finish_cancelled();
                    RunOutcome::Finished
                } else if shared.policy.should_retry(self, None, None, attempt) {
                    self.set_state(OperationState::Retrying);
                    tracing::info!(id = %self.id, attempt, error = %error, "retrying after transport failure");
                    RunOutcome::Requeue(shared.policy.retry_delay(attempt))
                } else {
                    self.finish_failed(&shared, error, None, None);
                    RunOutcome::Finished
                }
            }
            AttemptOutcome::FatalError(error) => {
                self.finish_failed(&shared, error, None, None);
                RunOutcome::Finished
            }
        }
    }

    async fn execute_attempt(&self, shared: &Arc<ClientShared>) -> AttemptOutcome {
        let request = match build_transport_request(&self.definition) {
            Ok(request) => request,
            Err(error) => return AttemptOutcome::FatalError(error),
        };

        let first = match self.send_cancellable(shared, request).await {
            Ok(sent) => sent,
            Err(outcome) => return outcome,
        };

        // A 401 offers the policy one chance to answer the challenge
        // within the same attempt before the normal retry path applies.
        if first.0.status == 401 {
            let challenge = first
                .0
                .header("www-authenticate")
                .and_then(AuthChallenge::parse);
            if let Some(challenge) = challenge {
                if let Some(credential) =
                    shared.policy.credential_for_challenge(self, &challenge)
                {
                    tracing::debug!(id = %self.id, scheme = %challenge.scheme, "answering auth challenge");
                    let mut request = match build_transport_request(&self.definition) {
                        Ok(request) => request,
                        Err(error) => return AttemptOutcome::FatalError(error),
                    };
                    request
                        .headers
                        .push(("authorization".into(), credential.authorization_header()));
                    return match self.send_cancellable(shared, request).await {
                        Ok((response, body)) => AttemptOutcome::Response(response, body),
                        Err(outcome) => outcome,
                    };
                }
            }
        }

        AttemptOutcome::Response(first.0, first.1)
    }

    async fn send_cancellable(
        &self,
        shared: &Arc<ClientShared>,
        request: TransportRequest,
    ) -> Result<(ServiceResponse, Bytes), AttemptOutcome> {
        let sent = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AttemptOutcome::Cancelled),
            sent = shared.transport.send(request) => sent,
        };
        sent.map_err(AttemptOutcome::TransportError)
    }

    fn handle_response(
        &self,
        shared: &Arc<ClientShared>,
        response: ServiceResponse,
        body: Bytes,
        attempt: u32,
    ) -> RunOutcome {
        if !response.is_success()
            && !self.cancel.is_cancelled()
            && shared
                .policy
                .should_retry(self, Some(&response), Some(body.as_ref()), attempt)
        {
            self.set_state(OperationState::Retrying);
            tracing::info!(
                id = %self.id,
                attempt,
                status = response.status,
                "retrying after retryable status"
            );
            return RunOutcome::Requeue(shared.policy.retry_delay(attempt));
        }

        // Terminal outcome from here on. A cancellation that raced the
        // response wins: no decode, no transform.
        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return RunOutcome::Finished;
        }

        let decoded =
            match shared
                .policy
                .transform_data(self, &body, self.definition.format, &response)
            {
                Ok(value) => value,
                Err(error) => {
                    self.finish_failed(shared, error, Some(response), None);
                    return RunOutcome::Finished;
                }
            };

        let transform = self
            .transform
            .lock()
            .expect("operation transform mutex poisoned")
            .take();
        let value = match transform {
            Some(transform) => match transform(&response, decoded) {
                Ok(value) => value,
                Err(error) => {
                    self.finish_failed(shared, error, Some(response), None);
                    return RunOutcome::Finished;
                }
            },
            None => decoded,
        };

        if response.is_success() {
            self.set_state(OperationState::Completed);
            self.complete(ServiceResult::Success, Some(response), Some(value));
        } else {
            let error = ServiceError::HttpStatus(response.status);
            self.set_state(OperationState::Failed);
            tracing::warn!(
                id = %self.id,
                url = %self.definition.url,
                status = response.status,
                "operation failed with terminal status"
            );
            shared.policy.operation_failed(self, &error);
            self.complete(ServiceResult::Failed, Some(response), Some(value));
        }
        RunOutcome::Finished
    }
}
