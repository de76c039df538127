#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardStep {
    #[default]
    Welcome,
    Instructions,
    Call,
    Result,
}

impl WizardStep {
    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::Welcome => "Welcome",
            WizardStep::Instructions => "Instructions",
            WizardStep::Call => "Handle Call",
            WizardStep::Result => "Training Framework Result",
        }
    }
}

/// Step sequencing for the trainer: welcome, instructions, call, result.
///
/// The result step is only reachable through a finished conversation, whose
/// id is kept for the retrieval that step performs.
#[derive(Debug, Default)]
pub struct Wizard {
    step: WizardStep,
    conversation_id: Option<String>,
}

impl Wizard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens directly on the result of an earlier conversation.
    pub fn for_conversation(conversation_id: &str) -> Self {
        Self {
            step: WizardStep::Result,
            conversation_id: Some(conversation_id.to_string()),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn advance(&mut self) -> WizardStep {
        self.step = match self.step {
            WizardStep::Welcome => WizardStep::Instructions,
            WizardStep::Instructions => WizardStep::Call,
            step => step,
        };
        self.step
    }

    /// Moves from the call to the result step. Ignored outside the call step.
    pub fn conversation_ended(&mut self, conversation_id: &str) -> bool {
        if self.step != WizardStep::Call || conversation_id.is_empty() {
            tracing::debug!(
                "ignoring conversation end for {:?} on step {:?}",
                conversation_id,
                self.step
            );
            return false;
        }
        self.conversation_id = Some(conversation_id.to_string());
        self.step = WizardStep::Result;
        true
    }

    pub fn restart(&mut self) {
        self.step = WizardStep::Welcome;
        self.conversation_id = None;
    }
}
