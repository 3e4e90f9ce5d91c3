// # Request Channel
//
// Line-delimited JSON spoken on stdin/stdout. One request per line, one
// response per line, in order.
//
// ```text
// -> {"op":"commit","edits":[{"operation":"modified","path":"system/hostname","new-value":"edge-01"}]}
// <- {"status":"ok","applied":["hostname"],"config":{...},"mismatches":[]}
// -> {"op":"get-state"}
// <- {"status":"ok","state":{...}}
// ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sysconf_core::{
    CommitOutcome, Edit, Error, ErrorReport, OperationalState, Subtree, SystemConfig,
};

/// A request read from stdin
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Apply one store transaction
    Commit {
        #[serde(default)]
        edits: Vec<Edit>,
    },
    /// Running configuration as persisted
    GetConfig,
    /// Operational state, read live
    GetState,
}

impl Request {
    pub fn parse(line: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Request::Commit { .. } => "commit",
            Request::GetConfig => "get-config",
            Request::GetState => "get-state",
        }
    }
}

#[derive(Debug, Serialize)]
struct Mismatch<'a> {
    subtree: Subtree,
    detail: &'a str,
}

/// A response written to stdout
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Response {
    Ok(Value),
    Error { error: ErrorReport },
}

impl Response {
    pub fn committed(outcome: &CommitOutcome) -> Self {
        let mismatches: Vec<Mismatch<'_>> = outcome
            .mismatches
            .iter()
            .map(|(subtree, detail)| Mismatch {
                subtree: *subtree,
                detail,
            })
            .collect();

        Response::Ok(serde_json::json!({
            "applied": outcome.applied,
            "config": outcome.config,
            "mismatches": mismatches,
        }))
    }

    pub fn config(config: &SystemConfig) -> Self {
        Response::Ok(serde_json::json!({ "config": config }))
    }

    pub fn state(state: &OperationalState) -> Self {
        Response::Ok(serde_json::json!({ "state": state }))
    }

    pub fn error(error: &Error) -> Self {
        Response::Error {
            error: error.report(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Render as a single line without the trailing newline
    pub fn to_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(line) => line,
            Err(e) => format!(
                r#"{{"status":"error","error":{{"kind":"json","message":{:?}}}}}"#,
                e.to_string()
            ),
        }
    }
}
