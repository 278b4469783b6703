use serde::{Deserialize, Serialize};

use vigil_core::RawAnnotation;
use vigil_infra::AnnotateOutcome;
use vigil_infra::store::TargetFilter;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct PatchSystemRequest {
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
}

/// `GET /v2/systems` query string. Flags take `t`/`f` (also `true`/`false`,
/// `1`/`0`, `yes`/`no`).
#[derive(Debug, Default, Deserialize)]
pub struct ListSystemsQuery {
    pub name: Option<String>,
    pub plugin: Option<String>,
    pub unused: Option<String>,
    pub exact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value '{value}' for '{param}' (expected t or f)")]
pub struct InvalidFlag {
    pub param: &'static str,
    pub value: String,
}

fn parse_flag(param: &'static str, value: &str) -> Result<bool, InvalidFlag> {
    match value.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "y" | "yes" => Ok(true),
        "f" | "false" | "0" | "n" | "no" => Ok(false),
        _ => Err(InvalidFlag {
            param,
            value: value.to_string(),
        }),
    }
}

impl ListSystemsQuery {
    pub fn into_filter(self) -> Result<TargetFilter, InvalidFlag> {
        let unused = self
            .unused
            .as_deref()
            .map(|v| parse_flag("unused", v))
            .transpose()?;
        let exact = self
            .exact
            .as_deref()
            .map(|v| parse_flag("exact", v))
            .transpose()?
            .unwrap_or(false);

        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Ok(TargetFilter {
            name: non_empty(self.name),
            exact,
            plugin: non_empty(self.plugin),
            used: unused.map(|u| !u),
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct PatchSystemResponse {
    pub ok: &'static str,
    pub applied: usize,
    pub marked_irrelevant: u64,
}

impl From<AnnotateOutcome> for PatchSystemResponse {
    fn from(outcome: AnnotateOutcome) -> Self {
        Self {
            ok: "annotated successfully",
            applied: outcome.applied,
            marked_irrelevant: outcome.relevance.marked_irrelevant,
        }
    }
}
