//! Provider-neutral stage kinds.
//!
//! None of these need shared defaults.

use super::{to_fields, StageDefinition, StageFields};
use crate::context::Scope;
use crate::core::StageOptions;
use crate::errors::CanalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Pauses the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wait {
    wait_time: String,
    #[serde(skip)]
    options: StageOptions,
}

impl Wait {
    /// Waits a fixed number of seconds.
    #[must_use]
    pub fn seconds(seconds: u64) -> Self {
        Self::expression(seconds.to_string())
    }

    /// Waits for a duration, truncated to whole seconds.
    #[must_use]
    pub fn duration(duration: Duration) -> Self {
        Self::seconds(duration.as_secs())
    }

    /// Waits for a number of seconds given by a pipeline expression.
    #[must_use]
    pub fn expression(wait_time: impl Into<String>) -> Self {
        Self {
            wait_time: wait_time.into(),
            options: StageOptions::default(),
        }
    }
}

/// Waits for a person to approve, optionally choosing one of several inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualJudgment {
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    judgment_inputs: Vec<String>,
    #[serde(skip)]
    options: StageOptions,
}

impl ManualJudgment {
    /// Creates a judgment with no instructions or inputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instructions shown to the judge.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Sets the choices offered to the judge.
    #[must_use]
    pub fn judgment_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.judgment_inputs = inputs.into_iter().map(Into::into).collect();
        self
    }
}

/// A precondition checked by [`CheckPreconditions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Precondition {
    /// Passes when the expression evaluates to true.
    Expression {
        /// Expression context.
        context: ExpressionContext,
    },
}

/// The `context` of an expression precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionContext {
    /// The expression text.
    pub expression: String,
}

impl Precondition {
    /// An expression precondition.
    #[must_use]
    pub fn expression(expression: impl Into<String>) -> Self {
        Self::Expression {
            context: ExpressionContext {
                expression: expression.into(),
            },
        }
    }
}

/// Fails unless all preconditions hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckPreconditions {
    preconditions: Vec<Precondition>,
    #[serde(skip)]
    options: StageOptions,
}

impl CheckPreconditions {
    /// Creates a check with no preconditions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a precondition.
    #[must_use]
    pub fn precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }
}

/// Runs a Jenkins job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Jenkins {
    job: String,
    master: String,
    parameters: BTreeMap<String, String>,
    wait_for_completion: bool,
    #[serde(skip)]
    options: StageOptions,
}

impl Jenkins {
    /// Runs `job` on the Jenkins `master`, waiting for it to finish.
    #[must_use]
    pub fn new(job: impl Into<String>, master: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            master: master.into(),
            parameters: BTreeMap::new(),
            wait_for_completion: true,
            options: StageOptions::default(),
        }
    }

    /// Adds a job parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Whether the stage waits for the job to finish.
    #[must_use]
    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }
}

/// Calls an HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    method: String,
    url: String,
    wait_for_completion: bool,
    #[serde(skip)]
    options: StageOptions,
}

impl Webhook {
    /// Calls `url` with `method`.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            wait_for_completion: true,
            options: StageOptions::default(),
        }
    }

    /// Whether the stage waits for the call to complete.
    #[must_use]
    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }
}

macro_rules! scope_free_stage {
    ($stage:ty, $kind:literal) => {
        impl StageDefinition for $stage {
            fn kind(&self) -> &str {
                $kind
            }

            fn options(&self) -> &StageOptions {
                &self.options
            }

            fn options_mut(&mut self) -> &mut StageOptions {
                &mut self.options
            }

            fn fields(&self, _scope: &Scope<'_>) -> Result<StageFields, CanalError> {
                to_fields(self)
            }
        }
    };
}

scope_free_stage!(Wait, "wait");
scope_free_stage!(ManualJudgment, "manualJudgment");
scope_free_stage!(CheckPreconditions, "checkPreconditions");
scope_free_stage!(Jenkins, "jenkins");
scope_free_stage!(Webhook, "webhook");
