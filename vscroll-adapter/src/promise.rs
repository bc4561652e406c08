use vscroll::{Reactive, Subscription};

/// How an adapter method call ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdapterMethodResult {
    pub success: bool,
    /// Resolved within the call itself, without waiting for the host.
    pub immediate: bool,
    pub details: Option<String>,
}

impl AdapterMethodResult {
    pub(crate) fn rejected(details: impl Into<String>) -> Self {
        Self {
            success: false,
            immediate: true,
            details: Some(details.into()),
        }
    }
}

/// The pending result of an adapter method.
///
/// Resolves once, when the engine has no running cycle and no queued command left. Clones
/// share the same slot.
#[derive(Clone, Debug)]
pub struct MethodPromise {
    slot: Reactive<Option<AdapterMethodResult>>,
}

impl MethodPromise {
    pub(crate) fn new() -> Self {
        Self {
            slot: Reactive::new(None),
        }
    }

    pub(crate) fn resolved(result: AdapterMethodResult) -> Self {
        Self {
            slot: Reactive::new(Some(result)),
        }
    }

    pub(crate) fn resolve(&self, result: AdapterMethodResult) {
        if self.slot.get().is_none() {
            self.slot.set(Some(result));
        }
    }

    /// The result, once resolved.
    pub fn get(&self) -> Option<AdapterMethodResult> {
        self.slot.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Calls `f` with the result when the promise resolves, or right away if it already has.
    pub fn on(&self, f: impl Fn(&AdapterMethodResult) + 'static) -> Option<Subscription> {
        if let Some(result) = self.slot.get() {
            f(&result);
            return None;
        }
        Some(self.slot.once(move |result| {
            if let Some(result) = result {
                f(result);
            }
        }))
    }
}
