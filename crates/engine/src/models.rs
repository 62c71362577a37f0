//! Trigger definitions.
//!
//! `TriggerRaw` is the wire form: one struct, kind-conditional optional
//! fields, nulls skipped on serialize. It validates into [`Trigger`], a sum
//! type carrying exactly the fields its kind needs, so "irrelevant fields
//! must remain unset" is a construction-time guarantee rather than a runtime
//! check.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::pattern::BlobPattern;

// ---------------------------------------------------------------------------
// TriggerKind
// ---------------------------------------------------------------------------

/// What type of trigger. Closed set; adding a kind is a breaking schema
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Blob,
    Queue,
    ServiceBus,
}

impl TriggerKind {
    fn name(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Queue => "queue",
            Self::ServiceBus => "service_bus",
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerRaw
// ---------------------------------------------------------------------------

/// Wire protocol for serializing triggers. Irrelevant fields remain unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRaw {
    /// What type of trigger.
    #[serde(rename = "type")]
    pub kind: TriggerKind,

    /// For blobs: input path of the form `container/blob`, with optional
    /// `{capture}` route parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_input: Option<String>,

    /// For blobs, optional: semicolon-delimited list of output paths. The
    /// trigger does not fire when every output is newer than the input.
    /// Output paths may reference captures bound by the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_output: Option<String>,

    /// For queues: the queue name, subject to storage naming rules
    /// (all lowercase).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,

    /// For service bus: the entity (queue or topic/subscription) name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
}

impl TriggerRaw {
    /// A blob trigger: fires when a new/updated input blob is detected.
    pub fn new_blob(blob_input: impl Into<String>, blob_output: Option<String>) -> Self {
        Self {
            kind: TriggerKind::Blob,
            blob_input: Some(blob_input.into()),
            blob_output,
            queue_name: None,
            entity_name: None,
        }
    }

    /// A queue trigger: fires once per queue message; the message is deleted
    /// only after the invocation is safely dispatched.
    pub fn new_queue(queue_name: impl Into<String>) -> Self {
        Self {
            kind: TriggerKind::Queue,
            blob_input: None,
            blob_output: None,
            queue_name: Some(queue_name.into()),
            entity_name: None,
        }
    }

    pub fn new_service_bus(entity_name: impl Into<String>) -> Self {
        Self {
            kind: TriggerKind::ServiceBus,
            blob_input: None,
            blob_output: None,
            queue_name: None,
            entity_name: Some(entity_name.into()),
        }
    }

    /// Validate into the kind-exact [`Trigger`] representation.
    ///
    /// # Errors
    /// - [`ValidationError::MissingField`] — a kind-required field is absent.
    /// - [`ValidationError::IrrelevantField`] — a field for another kind is
    ///   populated.
    /// - [`ValidationError::InvalidQueueName`] / [`ValidationError::InvalidPattern`] /
    ///   [`ValidationError::UnboundCapture`] — the populated fields are
    ///   themselves malformed.
    pub fn validate(&self) -> Result<Trigger, ValidationError> {
        let kind = self.kind.name();
        let reject_present = |field: &'static str, value: &Option<String>| {
            if value.is_some() {
                Err(ValidationError::IrrelevantField { kind, field })
            } else {
                Ok(())
            }
        };

        match self.kind {
            TriggerKind::Blob => {
                reject_present("queue_name", &self.queue_name)?;
                reject_present("entity_name", &self.entity_name)?;
                let input = self.blob_input.as_deref().ok_or(
                    ValidationError::MissingField {
                        kind,
                        field: "blob_input",
                    },
                )?;
                let outputs: Vec<&str> = self
                    .blob_output
                    .as_deref()
                    .map(|o| o.split(';').collect())
                    .unwrap_or_default();
                Trigger::blob(input, &outputs)
            }
            TriggerKind::Queue => {
                reject_present("blob_input", &self.blob_input)?;
                reject_present("blob_output", &self.blob_output)?;
                reject_present("entity_name", &self.entity_name)?;
                let name = self.queue_name.as_deref().ok_or(
                    ValidationError::MissingField {
                        kind,
                        field: "queue_name",
                    },
                )?;
                Trigger::queue(name)
            }
            TriggerKind::ServiceBus => {
                reject_present("blob_input", &self.blob_input)?;
                reject_present("blob_output", &self.blob_output)?;
                reject_present("queue_name", &self.queue_name)?;
                let entity = self.entity_name.as_deref().ok_or(
                    ValidationError::MissingField {
                        kind,
                        field: "entity_name",
                    },
                )?;
                Trigger::service_bus(entity)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// QueueName
// ---------------------------------------------------------------------------

/// A validated storage queue name: 3–63 characters, lowercase alphanumeric
/// and single hyphens, alphanumeric at both ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let reject = |reason: &'static str| ValidationError::InvalidQueueName {
            name: name.clone(),
            reason,
        };

        if name.len() < 3 || name.len() > 63 {
            return Err(reject("length must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(reject(
                "only lowercase letters, digits and hyphens are allowed",
            ));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(reject("must start and end with a letter or digit"));
        }
        if name.contains("--") {
            return Err(reject("consecutive hyphens are not allowed"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// A validated trigger definition. Each variant carries exactly the fields
/// relevant to its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Fires when a matching input blob is strictly newer than the oldest of
    /// its resolved outputs (or unconditionally when there are no outputs).
    Blob {
        input: BlobPattern,
        outputs: Vec<BlobPattern>,
    },
    /// Fires once per message on a storage queue.
    Queue { queue: QueueName },
    /// Fires once per message on a service-bus entity.
    ServiceBus { entity: String },
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::Blob { .. } => TriggerKind::Blob,
            Self::Queue { .. } => TriggerKind::Queue,
            Self::ServiceBus { .. } => TriggerKind::ServiceBus,
        }
    }

    /// Construct a blob trigger, validating that every output capture is
    /// bound by the input pattern.
    pub fn blob(input: &str, outputs: &[&str]) -> Result<Self, ValidationError> {
        let input = BlobPattern::parse(input)?;
        let bound = input.captures();
        let outputs = outputs
            .iter()
            .map(|raw| {
                let output = BlobPattern::parse(raw)?;
                for name in output.captures() {
                    if !bound.contains(&name) {
                        return Err(ValidationError::UnboundCapture {
                            pattern: output.as_str().to_owned(),
                            name: name.to_owned(),
                        });
                    }
                }
                Ok(output)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Blob { input, outputs })
    }

    pub fn queue(name: &str) -> Result<Self, ValidationError> {
        Ok(Self::Queue {
            queue: QueueName::new(name)?,
        })
    }

    pub fn service_bus(entity: &str) -> Result<Self, ValidationError> {
        if entity.is_empty() {
            return Err(ValidationError::MissingField {
                kind: "service_bus",
                field: "entity_name",
            });
        }
        Ok(Self::ServiceBus {
            entity: entity.to_owned(),
        })
    }

    /// The queue/service-bus entity this trigger listens on, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Queue { queue } => Some(queue.as_str()),
            Self::ServiceBus { entity } => Some(entity),
            Self::Blob { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerSubscription
// ---------------------------------------------------------------------------

/// A trigger bound to the function it invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSubscription {
    pub function_id: String,
    pub trigger: Trigger,
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_raw_validates_into_blob_trigger() {
        let raw = TriggerRaw::new_blob("c/{name}.txt", Some("c/out/{name}.txt".into()));
        let trigger = raw.validate().unwrap();
        match trigger {
            Trigger::Blob { input, outputs } => {
                assert_eq!(input.as_str(), "c/{name}.txt");
                assert_eq!(outputs.len(), 1);
                assert_eq!(outputs[0].as_str(), "c/out/{name}.txt");
            }
            other => panic!("expected blob trigger, got {other:?}"),
        }
    }

    #[test]
    fn semicolon_list_yields_multiple_outputs() {
        let raw = TriggerRaw::new_blob(
            "c/{name}.txt",
            Some("c/out1/{name}.txt;c/out2/{name}.txt".into()),
        );
        match raw.validate().unwrap() {
            Trigger::Blob { outputs, .. } => assert_eq!(outputs.len(), 2),
            other => panic!("expected blob trigger, got {other:?}"),
        }
    }

    #[test]
    fn fields_for_another_kind_are_rejected() {
        let mut raw = TriggerRaw::new_queue("work-items");
        raw.blob_input = Some("c/x.txt".into());
        assert!(matches!(
            raw.validate(),
            Err(ValidationError::IrrelevantField {
                kind: "queue",
                field: "blob_input",
            })
        ));
    }

    #[test]
    fn missing_kind_field_is_rejected() {
        let raw = TriggerRaw {
            kind: TriggerKind::Blob,
            blob_input: None,
            blob_output: None,
            queue_name: None,
            entity_name: None,
        };
        assert!(matches!(
            raw.validate(),
            Err(ValidationError::MissingField {
                field: "blob_input",
                ..
            })
        ));
    }

    #[test]
    fn queue_name_rules_are_enforced() {
        assert!(QueueName::new("work-items").is_ok());
        assert!(QueueName::new("a1-b2-c3").is_ok());

        for bad in ["ab", "UPPER", "has_underscore", "-lead", "trail-", "a--b"] {
            assert!(QueueName::new(bad).is_err(), "accepted: {bad}");
        }
        assert!(QueueName::new("q".repeat(64)).is_err());
    }

    #[test]
    fn output_capture_must_be_bound_by_input() {
        let raw = TriggerRaw::new_blob("c/{name}.txt", Some("c/out/{other}.txt".into()));
        assert!(matches!(
            raw.validate(),
            Err(ValidationError::UnboundCapture { name, .. }) if name == "other"
        ));
    }

    #[test]
    fn wire_form_skips_irrelevant_fields() {
        let raw = TriggerRaw::new_queue("work-items");
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "queue", "queue_name": "work-items" })
        );
    }
}
