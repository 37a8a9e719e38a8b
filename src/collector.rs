use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::client::KvStore;
use crate::error::BenchError;
use crate::sample::{
    DurationSample, KeyTemplate, OperationKind, Payload, ScopedTimer, SizeDescriptor,
};

/// Samples for every operation of one write/read/delete cycle, keyed by kind.
pub type CycleSamples = BTreeMap<OperationKind, Vec<DurationSample>>;

/// Cooperative stop signal, checked between iterations and never mid-call.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives timed operations one at a time against a store.
pub struct Collector<'a, S: KvStore> {
    store: &'a S,
    iterations: usize,
    warmup: usize,
    abort: AbortHandle,
}

impl<'a, S: KvStore> Collector<'a, S> {
    pub fn new(store: &'a S, iterations: usize, warmup: usize) -> Self {
        Self {
            store,
            iterations,
            warmup,
            abort: AbortHandle::default(),
        }
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Times `iterations` calls of a single operation after `warmup` untimed
    /// calls. Warm-up calls use the template's warm-up namespace.
    ///
    /// Reads and deletes need a key to act on, so each iteration's key is
    /// written untimed first. Keys left behind are deleted untimed afterwards.
    pub async fn collect(
        &self,
        kind: OperationKind,
        size: SizeDescriptor,
        keys: &KeyTemplate,
        payload: &Payload,
    ) -> Result<Vec<DurationSample>, BenchError> {
        let warmup_keys = keys.warmup();
        for i in 0..self.warmup {
            self.check_abort()?;
            let key = warmup_keys.key(i);
            self.seed(kind, &key, payload).await?;
            invoke(self.store, kind, &key, payload).await?;
            self.clean_up(kind, &key, payload).await?;
        }

        let mut samples = Vec::with_capacity(self.iterations);
        for i in 0..self.iterations {
            self.check_abort()?;
            let key = keys.key(i);
            self.seed(kind, &key, payload).await?;
            self.timed(kind, size, &key, payload, &mut samples).await?;
            self.clean_up(kind, &key, payload).await?;
        }
        debug!(%kind, %size, samples = samples.len(), "collected samples");
        Ok(samples)
    }

    /// Each iteration writes a fresh key, reads it back and deletes it,
    /// timing every call separately.
    pub async fn collect_cycle(
        &self,
        size: SizeDescriptor,
        keys: &KeyTemplate,
        payload: &Payload,
    ) -> Result<CycleSamples, BenchError> {
        let cycle = size.category.cycle();

        let warmup_keys = keys.warmup();
        for i in 0..self.warmup {
            self.check_abort()?;
            let key = warmup_keys.key(i);
            for kind in cycle {
                invoke(self.store, kind, &key, payload).await?;
            }
        }

        let mut samples: CycleSamples = cycle
            .iter()
            .map(|kind| (*kind, Vec::with_capacity(self.iterations)))
            .collect();
        for i in 0..self.iterations {
            self.check_abort()?;
            let key = keys.key(i);
            for kind in cycle {
                let sink = samples.entry(kind).or_default();
                self.timed(kind, size, &key, payload, sink).await?;
            }
        }
        debug!(%size, iterations = self.iterations, "collected cycle samples");
        Ok(samples)
    }

    async fn timed(
        &self,
        kind: OperationKind,
        size: SizeDescriptor,
        key: &str,
        payload: &Payload,
        sink: &mut Vec<DurationSample>,
    ) -> Result<(), BenchError> {
        let _timer = ScopedTimer::start(kind, size, sink);
        invoke(self.store, kind, key, payload).await
    }

    async fn seed(
        &self,
        kind: OperationKind,
        key: &str,
        payload: &Payload,
    ) -> Result<(), BenchError> {
        if kind.is_write() {
            return Ok(());
        }
        invoke(self.store, seed_kind(kind, payload), key, payload).await
    }

    async fn clean_up(
        &self,
        kind: OperationKind,
        key: &str,
        payload: &Payload,
    ) -> Result<(), BenchError> {
        if kind == OperationKind::Delete {
            return Ok(());
        }
        invoke(self.store, OperationKind::Delete, key, payload).await
    }

    fn check_abort(&self) -> Result<(), BenchError> {
        if self.abort.is_aborted() {
            return Err(BenchError::Aborted);
        }
        Ok(())
    }
}

/// Issues one operation and maps refusals and transport errors to
/// `OperationFailure`.
pub async fn invoke<S: KvStore>(
    store: &S,
    kind: OperationKind,
    key: &str,
    payload: &Payload,
) -> Result<(), BenchError> {
    let failure = |reason: String| BenchError::OperationFailure {
        operation: kind,
        key: key.to_string(),
        reason,
    };

    let outcome = match (kind, payload) {
        (OperationKind::Set, Payload::Text(value)) => store.set(key, value, None).await,
        (OperationKind::SetJson, Payload::Document(value)) => {
            store.set_json(key, value, None).await
        }
        (OperationKind::Set | OperationKind::SetJson, _) => {
            return Err(BenchError::InvalidConfig(format!(
                "{} cannot write a {} payload",
                kind,
                payload_name(payload)
            )));
        }
        (OperationKind::Get, _) => store.get(key).await.map(|value| value.is_some()),
        (OperationKind::GetJson, _) => store.get_json(key).await.map(|value| value.is_some()),
        (OperationKind::Delete, _) => store.delete(key).await,
    };

    match outcome {
        Ok(true) => Ok(()),
        Ok(false) if kind.is_write() || kind == OperationKind::Delete => {
            Err(failure("non-success response".to_string()))
        }
        Ok(false) => Err(failure("key not found".to_string())),
        Err(err) => Err(failure(format!("{:#}", err))),
    }
}

/// The write that puts a key in place for `kind` to act on.
fn seed_kind(kind: OperationKind, payload: &Payload) -> OperationKind {
    match (kind, payload) {
        (OperationKind::Get, _) => OperationKind::Set,
        (OperationKind::GetJson, _) => OperationKind::SetJson,
        (_, Payload::Text(_)) => OperationKind::Set,
        (_, Payload::Document(_)) => OperationKind::SetJson,
    }
}

fn payload_name(payload: &Payload) -> &'static str {
    match payload {
        Payload::Text(_) => "string",
        Payload::Document(_) => "document",
    }
}
