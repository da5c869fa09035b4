//! Shared plumbing for stateful stream operators.
//!
//! Each subscription to an operator's output gets its own state, created
//! fresh when the subscription starts. The state is locked only while an
//! input is folded in; results are delivered after the lock is released.

use parking_lot::Mutex;
use ripple_reactive::{Observer, Stream};
use std::sync::Arc;

/// Folds inputs into per-subscription state, producing at most one output
/// per input.
pub(crate) trait Transform<In>: Send {
    type Out;

    fn apply(&mut self, input: &In) -> Option<Self::Out>;
}

struct TransformObserver<S, Out> {
    state: Mutex<S>,
    downstream: Arc<dyn Observer<Out>>,
}

impl<In, S> Observer<In> for TransformObserver<S, S::Out>
where
    S: Transform<In>,
{
    fn on_next(&self, input: &In) {
        let output = self.state.lock().apply(input);
        if let Some(output) = output {
            self.downstream.on_next(&output);
        }
    }

    fn on_completed(&self) {
        self.downstream.on_completed();
    }
}

/// Builds the output stream of a stateful operator over `upstream`.
pub(crate) fn transform<In, S, F>(upstream: &Stream<In>, init: F) -> Stream<S::Out>
where
    In: 'static,
    S: Transform<In> + 'static,
    S::Out: 'static,
    F: Fn() -> S + Send + Sync + 'static,
{
    let upstream = upstream.clone();
    Stream::new(move |downstream: Arc<dyn Observer<S::Out>>| {
        upstream.subscribe_observer(Arc::new(TransformObserver {
            state: Mutex::new(init()),
            downstream,
        }))
    })
}
