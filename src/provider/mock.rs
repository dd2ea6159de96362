//! Scripted provider for tests

use super::{MarketDataProvider, ProviderRow};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone)]
enum Script {
    Rows(Vec<ProviderRow>),
    Fail(String),
    /// Fail this many more calls, then return the rows
    FailThenRows(usize, Vec<ProviderRow>),
    Panic,
}

/// Provider returning canned responses per function
#[derive(Default)]
pub(crate) struct MockProvider {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `function` with the given rows (each must be a JSON object)
    pub fn with_rows(self, function: &str, rows: Vec<Value>) -> Self {
        self.scripts
            .lock()
            .insert(function.to_string(), Script::Rows(objects(rows)));
        self
    }

    /// Fail the first `failures` calls to `function`, then respond with rows
    pub fn with_failures_then_rows(
        self,
        function: &str,
        failures: usize,
        rows: Vec<Value>,
    ) -> Self {
        self.scripts.lock().insert(
            function.to_string(),
            Script::FailThenRows(failures, objects(rows)),
        );
        self
    }

    /// Fail every call to `function` with a provider error
    pub fn with_failure(self, function: &str, message: &str) -> Self {
        self.scripts
            .lock()
            .insert(function.to_string(), Script::Fail(message.to_string()));
        self
    }

    /// Panic inside every call to `function`
    pub fn with_panic(self, function: &str) -> Self {
        self.scripts.lock().insert(function.to_string(), Script::Panic);
        self
    }

    /// Number of calls made to `function`
    pub fn call_count(&self, function: &str) -> usize {
        self.calls.lock().iter().filter(|(f, _)| f == function).count()
    }

    /// Parameters of the most recent call to `function`
    pub fn last_params(&self, function: &str) -> Option<Vec<(String, String)>> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(f, _)| f == function)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn fetch_rows(
        &self,
        function: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<ProviderRow>> {
        self.calls.lock().push((
            function.to_string(),
            params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ));

        let script = {
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(function) {
                Some(Script::FailThenRows(remaining, rows)) => {
                    if *remaining > 0 {
                        *remaining -= 1;
                        Some(Script::Fail(format!("{} temporarily unavailable", function)))
                    } else {
                        Some(Script::Rows(rows.clone()))
                    }
                }
                other => other.cloned(),
            }
        };
        match script {
            Some(Script::Rows(rows)) => Ok(rows),
            Some(Script::Fail(message)) => Err(AppError::Provider(message)),
            Some(Script::FailThenRows(..)) => unreachable!("resolved above"),
            Some(Script::Panic) => panic!("scripted provider panic in {}", function),
            None => Ok(Vec::new()),
        }
    }
}

fn objects(rows: Vec<Value>) -> Vec<ProviderRow> {
    rows.into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}
