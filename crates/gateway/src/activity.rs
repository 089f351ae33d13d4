//! Write activity records for the document side channel.
//!
//! Metadata only (never row contents). The side channel is best effort:
//! a failing sink is logged and the write it describes still succeeds.

use serde::Serialize;
use serde_json::{Map, Value};

use classguard_auth::Caller;
use classguard_infra::DocumentSink;
use classguard_infra::documents::collections;
use classguard_policy::{Operation, Relation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct WriteActivity {
    pub relation: Relation,
    pub operation: Operation,
    pub caller_id: Option<String>,
    pub role: Option<String>,
    pub affected: usize,
}

impl WriteActivity {
    pub fn new(caller: &Caller, relation: Relation, operation: Operation, affected: usize) -> Self {
        Self {
            relation,
            operation,
            caller_id: caller.principal().map(|p| p.id.to_string()),
            role: caller.role().map(|r| r.to_string()),
            affected,
        }
    }

    fn into_document(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

pub(crate) async fn record(sink: Option<&dyn DocumentSink>, activity: WriteActivity) {
    let Some(sink) = sink else { return };
    let relation = activity.relation;
    if let Err(e) = sink.insert(collections::LOGS, activity.into_document()).await {
        tracing::warn!(relation = %relation, error = %e, "failed to record write activity");
    }
}
