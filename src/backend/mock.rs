//! In-memory backend double for command-layer tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::tags::{self, StoreMode};

use super::{
    Backend, BackendError, BackendKind, BackendProvider, DescribeOutput, GetOptions,
    ParameterEntry, PutOptions, Ref, decode_json, encode_json_value,
};

#[derive(Debug, Clone)]
struct MockEntry {
    value: String,
    store_mode: StoreMode,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PutCall {
    pub target: Ref,
    pub value: String,
    pub store_mode: StoreMode,
    pub secure: bool,
}

/// Records every call and serves values from an in-memory map, keyed by the
/// full ref string so `ps:` and `sm:` entries never collide.
#[derive(Default)]
pub struct MockBackend {
    store: Mutex<BTreeMap<String, MockEntry>>,
    puts: Mutex<Vec<PutCall>>,
    list_calls: Mutex<Vec<(String, bool)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entry without recording a put call.
    pub fn seed(&self, raw_ref: &str, value: &str, store_mode: StoreMode) {
        self.store.lock().unwrap().insert(
            raw_ref.to_string(),
            MockEntry {
                value: value.to_string(),
                store_mode,
                tags: tags::managed_tags(store_mode),
            },
        );
    }

    pub fn put_calls(&self) -> Vec<PutCall> {
        self.puts.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<(String, bool)> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn put(&self, target: &Ref, opts: PutOptions) -> Result<(), BackendError> {
        self.puts.lock().unwrap().push(PutCall {
            target: target.clone(),
            value: opts.value.clone(),
            store_mode: opts.store_mode,
            secure: opts.secure,
        });

        let stored = match opts.store_mode {
            StoreMode::Json => encode_json_value(&opts.value),
            StoreMode::Raw => opts.value,
        };

        self.store.lock().unwrap().insert(
            target.to_string(),
            MockEntry {
                value: stored,
                store_mode: opts.store_mode,
                tags: tags::managed_tags(opts.store_mode),
            },
        );
        Ok(())
    }

    async fn get(&self, target: &Ref, opts: GetOptions) -> Result<String, BackendError> {
        let entry = self
            .store
            .lock()
            .unwrap()
            .get(&target.to_string())
            .cloned()
            .ok_or_else(|| BackendError::NotFound(target.to_string()))?;

        if opts.force_raw {
            return Ok(entry.value);
        }
        if opts.force_json || entry.store_mode == StoreMode::Json {
            return decode_json(&entry.value);
        }
        Ok(entry.value)
    }

    async fn describe(&self, target: &Ref) -> Result<DescribeOutput, BackendError> {
        let entry = self
            .store
            .lock()
            .unwrap()
            .get(&target.to_string())
            .cloned()
            .ok_or_else(|| BackendError::NotFound(target.to_string()))?;

        let mut out = DescribeOutput {
            path: target.path.clone(),
            version: Some(1),
            tags: entry.tags,
            ..DescribeOutput::default()
        };
        match target.kind {
            BackendKind::Ps => {
                out.parameter_type = Some("String".to_string());
                out.tier = Some("Standard".to_string());
            }
            BackendKind::Psa => {
                out.parameter_type = Some("String".to_string());
                out.tier = Some("Advanced".to_string());
            }
            BackendKind::Sm => {}
        }
        Ok(out)
    }

    async fn list_by_prefix(
        &self,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<ParameterEntry>, BackendError> {
        self.list_calls
            .lock()
            .unwrap()
            .push((path.to_string(), recursive));

        let normalized = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };

        let store = self.store.lock().unwrap();
        let mut result = Vec::new();
        for (raw_ref, entry) in store.iter() {
            let Ok(parsed) = Ref::parse(raw_ref) else {
                continue;
            };
            let Some(remainder) = parsed.path.strip_prefix(&normalized) else {
                continue;
            };
            if !recursive && remainder.contains('/') {
                continue;
            }
            result.push(ParameterEntry {
                path: parsed.path.clone(),
                value: entry.value.clone(),
                store_mode: entry.store_mode,
            });
        }
        Ok(result)
    }
}

/// Provider handing out one shared [`MockBackend`] per kind.
#[derive(Default)]
pub struct MockProvider {
    backend: Arc<MockBackend>,
    fail: Mutex<Option<String>>,
}

impl MockProvider {
    pub fn new(backend: Arc<MockBackend>) -> Self {
        Self {
            backend,
            fail: Mutex::new(None),
        }
    }

    /// Makes every `backend()` call fail with the given message.
    pub fn fail_with(&self, message: &str) {
        *self.fail.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl BackendProvider for MockProvider {
    async fn backend(&self, _kind: BackendKind) -> Result<Arc<dyn Backend>, BackendError> {
        if let Some(message) = self.fail.lock().unwrap().clone() {
            return Err(BackendError::Other(anyhow!("{message}")));
        }
        Ok(Arc::clone(&self.backend) as Arc<dyn Backend>)
    }
}
