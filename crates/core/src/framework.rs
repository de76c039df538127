use serde::{Deserialize, Serialize};

/// One call-handling action, in the order the office performed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub examples: String,
}

/// The training framework extracted from a finished conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingFrameworkDocument {
    pub title: String,
    pub description: String,
    pub usage: String,
    #[serde(rename = "usageContext")]
    pub usage_context: String,
    #[serde(rename = "promptBlockSteps")]
    pub steps: Vec<Step>,
}
