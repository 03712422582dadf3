//! Pipeline assembly configuration.

use serde::{Deserialize, Serialize};

/// How wire `refId`s are derived from stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefIdStyle {
    /// `"{type}{n}"` with `n` counting from 1 in emission order, e.g. `wait1`.
    ///
    /// A type that already ends in a digit gets a dash before the counter
    /// (`stage2-1`), so the trailing digits of every `refId` are exactly its
    /// position and no two stages share one.
    #[default]
    Sequential,
    /// The stage id itself.
    StageId,
}

impl RefIdStyle {
    pub(crate) fn ref_id(self, kind: &str, id: &str, position: usize) -> String {
        match self {
            Self::Sequential if kind.ends_with(|c: char| c.is_ascii_digit()) => {
                format!("{kind}-{}", position + 1)
            }
            Self::Sequential => format!("{kind}{}", position + 1),
            Self::StageId => id.to_string(),
        }
    }
}

/// Settings applied when a pipeline is built.
///
/// Loadable from any serde source; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// How `refId`s are derived.
    pub ref_id_style: RefIdStyle,
    /// Disallow concurrent executions of the pipeline.
    pub limit_concurrent: bool,
    /// Queue executions instead of cancelling waiting ones.
    pub keep_waiting_pipelines: bool,
    /// Check graph invariants before serializing.
    pub validate_graph: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ref_id_style: RefIdStyle::default(),
            limit_concurrent: true,
            keep_waiting_pipelines: false,
            validate_graph: true,
        }
    }
}

impl PipelineConfig {
    /// Sets the `refId` style.
    #[must_use]
    pub fn with_ref_id_style(mut self, style: RefIdStyle) -> Self {
        self.ref_id_style = style;
        self
    }

    /// Sets `limitConcurrent`.
    #[must_use]
    pub fn with_limit_concurrent(mut self, limit: bool) -> Self {
        self.limit_concurrent = limit;
        self
    }

    /// Sets `keepWaitingPipelines`.
    #[must_use]
    pub fn with_keep_waiting_pipelines(mut self, keep: bool) -> Self {
        self.keep_waiting_pipelines = keep;
        self
    }

    /// Enables or disables the graph invariant check.
    #[must_use]
    pub fn with_graph_validation(mut self, validate: bool) -> Self {
        self.validate_graph = validate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();

        assert_eq!(config.ref_id_style, RefIdStyle::Sequential);
        assert!(config.limit_concurrent);
        assert!(!config.keep_waiting_pipelines);
        assert!(config.validate_graph);
    }

    #[test]
    fn test_partial_config_from_json() {
        let config: PipelineConfig = serde_json::from_value(serde_json::json!({
            "refIdStyle": "stageId",
            "limitConcurrent": false
        }))
        .unwrap();

        assert_eq!(config.ref_id_style, RefIdStyle::StageId);
        assert!(!config.limit_concurrent);
        assert!(config.validate_graph);
    }

    #[test]
    fn test_ref_id_styles() {
        assert_eq!(RefIdStyle::Sequential.ref_id("wait", "abc", 0), "wait1");
        assert_eq!(RefIdStyle::Sequential.ref_id("deployService", "abc", 3), "deployService4");
        assert_eq!(RefIdStyle::StageId.ref_id("wait", "abc", 0), "abc");
    }

    #[test]
    fn test_kind_ending_in_digit_gets_separator() {
        assert_eq!(RefIdStyle::Sequential.ref_id("wait1", "abc", 0), "wait1-1");
        assert_eq!(RefIdStyle::Sequential.ref_id("wait", "abc", 10), "wait11");
        assert_eq!(RefIdStyle::Sequential.ref_id("s3Upload", "abc", 1), "s3Upload2");
    }
}
