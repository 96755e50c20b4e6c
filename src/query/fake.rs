use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{QueryError, RemoteStateClient, Row};

type Script = VecDeque<Result<Vec<Row>, QueryError>>;

/// Scripted client used in tests and the rows-file helper.
///
/// Replays queued responses in order; once the script runs dry every query returns
/// an empty result set. Clones share the same script and query log.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    script: Arc<Mutex<Script>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<Vec<Row>, QueryError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            queries: Arc::default(),
        }
    }

    pub fn push(&self, response: Result<Vec<Row>, QueryError>) {
        self.script.lock().push_back(response);
    }

    /// Every query text received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

impl RemoteStateClient for ScriptedClient {
    fn query(&mut self, text: &str) -> Result<Vec<Row>, QueryError> {
        self.queries.lock().push(text.to_string());
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
