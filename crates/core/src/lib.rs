//! Call-handling trainer core.
//!
//! Drives one voice conversation with a remote agent, hands the finished
//! conversation id to the retrieval step and fetches the training framework
//! produced from it. Runtimes plug in through [`agent::VoiceAgent`],
//! [`microphone::MicrophoneGate`] and [`notification::Notifier`].

pub mod agent;
pub mod error;
pub mod framework;
pub mod microphone;
pub mod notification;
pub mod retriever;
pub mod session;
pub mod shell;
pub mod wizard;

pub use agent::{AgentEvent, ConversationMessage, MessageSource, VoiceAgent};
pub use error::SessionError;
pub use framework::{Step, TrainingFrameworkDocument};
pub use microphone::{MicrophoneError, MicrophoneGate, MicrophoneGrant, MicrophoneInput};
pub use notification::{Notification, NotificationVariant, Notifier};
pub use retriever::{ArtifactRetriever, FetchTicket, FlowClient, RetrievalError, RetrievalState};
pub use session::{ControllerConfig, SessionController, SessionSnapshot, SessionStatus};
pub use shell::{FetchOutcome, Hint, ShellCommand, ShellUpdate, TrainerShell};
pub use wizard::{Wizard, WizardStep};
