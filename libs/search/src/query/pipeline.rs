use super::Stage;
use serde_json::Value as JsonValue;

/// Ordered, mutable sequence of aggregation stages.
///
/// Starts empty; [`add_pipe`](Self::add_pipe) appends and
/// [`clear`](Self::clear) returns it to the empty state so the same instance
/// can assemble another pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineBuilder {
    pipeline: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pipe(&mut self, stage: Stage) {
        self.pipeline.push(stage);
    }

    pub fn extend<I: IntoIterator<Item = Stage>>(&mut self, stages: I) {
        self.pipeline.extend(stages);
    }

    pub fn clear(&mut self) {
        self.pipeline.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pipeline.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pipeline.len()
    }

    pub fn pipeline(&self) -> &[Stage] {
        &self.pipeline
    }

    pub fn into_pipeline(self) -> Vec<Stage> {
        self.pipeline
    }

    /// Every string used as a `$regex` operand anywhere in the pipeline,
    /// in document order.
    ///
    /// Diagnostic helper: values of unexpected shape are skipped and a
    /// pipeline that fails to serialize yields an empty list.
    pub fn regex_pipe_values(&self) -> Vec<String> {
        let tree = match serde_json::to_value(&self.pipeline) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to serialize pipeline for regex extraction");
                return Vec::new();
            }
        };
        let mut values = Vec::new();
        collect_regex_values(&tree, &mut values);
        values
    }
}

impl From<Vec<Stage>> for PipelineBuilder {
    fn from(pipeline: Vec<Stage>) -> Self {
        Self { pipeline }
    }
}

fn collect_regex_values(value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                if key == "$regex" {
                    if let Some(pattern) = child.as_str() {
                        out.push(pattern.to_string());
                    }
                    continue;
                }
                collect_regex_values(child, out);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_regex_values(item, out);
            }
        }
        _ => {}
    }
}
