//! Operator annotations: retroactive corrections to task and archive records.
//!
//! Annotations arrive as loosely-typed wire records (`RawAnnotation`) and are
//! validated into a closed [`Annotation`] variant before anything touches the
//! store. A batch with a single bad entry is rejected as a whole.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{ArchiveId, TaskId};
use crate::task::Task;

/// Annotation as received on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnnotation {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub disposition: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "clear_flag")]
    pub clear: bool,
}

/// Accepts `true`/`false`, `null`, or a string. Strings count as set unless
/// empty or one of `false`, `0`, `no`.
fn clear_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => {
            let s = s.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "false" || s == "0" || s == "no")
        }
    })
}

/// Changes to a task's operator annotation.
///
/// `clear` is applied first; any non-empty `disposition`/`notes` are set
/// afterwards. Without `clear`, absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAnnotationUpdate {
    pub disposition: Option<String>,
    pub notes: Option<String>,
    pub clear: bool,
}

impl TaskAnnotationUpdate {
    /// Apply to a task record. Execution fields are never touched.
    pub fn apply(&self, task: &mut Task) {
        if self.clear {
            task.disposition = None;
            task.notes.clear();
        }
        if let Some(d) = &self.disposition {
            task.disposition = Some(d.clone());
        }
        if let Some(n) = &self.notes {
            task.notes = n.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAnnotation {
    pub task_id: TaskId,
    pub update: TaskAnnotationUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveAnnotation {
    pub archive_id: ArchiveId,
    pub notes: String,
}

/// A validated annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Task(TaskAnnotation),
    Archive(ArchiveAnnotation),
}

impl Annotation {
    pub fn kind(&self) -> &'static str {
        match self {
            Annotation::Task(_) => "task",
            Annotation::Archive(_) => "archive",
        }
    }

    /// Identifier of the annotated record, for logs and error messages.
    pub fn subject(&self) -> String {
        match self {
            Annotation::Task(a) => a.task_id.to_string(),
            Annotation::Archive(a) => a.archive_id.to_string(),
        }
    }

    fn from_raw(index: usize, raw: RawAnnotation) -> DomainResult<Self> {
        let non_empty = |s: String| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        match raw.kind.trim() {
            "task" => {
                let task_id: TaskId = raw.uuid.parse().map_err(|_| {
                    DomainError::validation(format!(
                        "annotation #{index}: invalid or missing task uuid '{}'",
                        raw.uuid
                    ))
                })?;
                Ok(Annotation::Task(TaskAnnotation {
                    task_id,
                    update: TaskAnnotationUpdate {
                        disposition: non_empty(raw.disposition),
                        notes: non_empty(raw.notes),
                        clear: raw.clear,
                    },
                }))
            }
            "archive" => {
                let archive_id: ArchiveId = raw.uuid.parse().map_err(|_| {
                    DomainError::validation(format!(
                        "annotation #{index}: invalid or missing archive uuid '{}'",
                        raw.uuid
                    ))
                })?;
                if !raw.disposition.trim().is_empty() {
                    return Err(DomainError::validation(format!(
                        "annotation #{index}: archives do not take a disposition"
                    )));
                }
                Ok(Annotation::Archive(ArchiveAnnotation {
                    archive_id,
                    notes: raw.notes.trim().to_string(),
                }))
            }
            other => Err(DomainError::validation(format!(
                "annotation #{index}: unrecognized system annotation type '{other}'"
            ))),
        }
    }
}

/// An ordered, fully-validated batch of annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationBatch(Vec<Annotation>);

impl AnnotationBatch {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self(annotations)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }
}

impl TryFrom<Vec<RawAnnotation>> for AnnotationBatch {
    type Error = DomainError;

    fn try_from(raw: Vec<RawAnnotation>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .enumerate()
            .map(|(i, r)| Annotation::from_raw(i, r))
            .collect::<DomainResult<Vec<_>>>()
            .map(Self)
    }
}

impl<'a> IntoIterator for &'a AnnotationBatch {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
