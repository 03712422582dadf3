//! Options shared by every stage kind.

use serde::{Deserialize, Serialize};

/// A condition evaluated by the platform at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    /// A pipeline expression, e.g. `${ trigger.parameters.deploy }`.
    Expression {
        /// The expression text.
        expression: String,
    },
}

impl Condition {
    /// Creates an expression condition.
    #[must_use]
    pub fn expression(expression: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.into(),
        }
    }
}

/// Options common to all stages. Unset options are omitted from the output.
///
/// `name` is carried on the stage record itself rather than in its fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOptions {
    /// Display name.
    #[serde(skip)]
    pub name: Option<String>,
    /// Free-form comments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    /// Only run the stage when this condition holds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_enabled: Option<Condition>,
    /// Let sibling branches finish before failing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_other_branches_then_fail: Option<bool>,
    /// Continue the pipeline when this stage fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_pipeline: Option<bool>,
    /// Fail the pipeline when this stage fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_pipeline: Option<bool>,
    /// Fail the stage when an expression in it cannot be evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_on_failed_expressions: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_options_serialize_to_empty_object() {
        let options = StageOptions {
            name: Some("ignored".to_string()),
            ..StageOptions::default()
        };
        assert_eq!(serde_json::to_value(&options).unwrap(), json!({}));
    }

    #[test]
    fn test_options_use_wire_names() {
        let options = StageOptions {
            comments: Some("deploy comment".to_string()),
            stage_enabled: Some(Condition::expression("exp1")),
            fail_pipeline: Some(false),
            ..StageOptions::default()
        };

        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({
                "comments": "deploy comment",
                "stageEnabled": {"type": "expression", "expression": "exp1"},
                "failPipeline": false
            })
        );
    }
}
