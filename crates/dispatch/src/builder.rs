//! Invocation request construction.
//!
//! Pure, side-effect-free validation: a request that builds is a request the
//! dispatcher will accept without further input checks.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use capabilities::FunctionDefinition;

use crate::error::BuildError;
use crate::models::{InvocationRequest, TriggerReason};

impl InvocationRequest {
    /// Assemble a request against a resolved function definition.
    ///
    /// # Errors
    /// - [`BuildError::EmptyFunctionId`] if the definition carries no id.
    /// - [`BuildError::UnknownParameter`] if a binding names a parameter the
    ///   function does not declare — extra bindings are a caller bug, never
    ///   silently dropped.
    /// - [`BuildError::NilPrerequisite`] if a prerequisite is the nil id.
    ///
    /// Self-dependency among prerequisites cannot be checked here because
    /// the instance id is assigned later, at dispatch; the dispatcher
    /// guarantees the fresh id never lands in this set.
    pub fn build(
        function: &FunctionDefinition,
        parameters: BTreeMap<String, String>,
        prerequisites: BTreeSet<Uuid>,
        reason: TriggerReason,
    ) -> Result<Self, BuildError> {
        if function.id.is_empty() {
            return Err(BuildError::EmptyFunctionId);
        }

        for name in parameters.keys() {
            if !function.parameters.iter().any(|p| p == name) {
                return Err(BuildError::UnknownParameter {
                    function_id: function.id.clone(),
                    name: name.clone(),
                });
            }
        }

        if prerequisites.contains(&Uuid::nil()) {
            return Err(BuildError::NilPrerequisite);
        }

        Ok(Self {
            function_id: function.id.clone(),
            parameters,
            prerequisites,
            reason,
        })
    }
}
