//! The trainer shell: wizard steps, the voice session and the framework
//! retrieval driven from one place.
//!
//! Runtimes feed it parsed commands, agent events and finished fetches and
//! render the [`ShellUpdate`]s it returns.

use crate::agent::{AgentEvent, VoiceAgent};
use crate::framework::TrainingFrameworkDocument;
use crate::microphone::MicrophoneGate;
use crate::notification::Notifier;
use crate::retriever::{ArtifactRetriever, FetchTicket, FlowClient, RetrievalError, RetrievalState};
use crate::session::{ControllerConfig, SessionController, SessionSnapshot, SessionStatus};
use crate::wizard::{Wizard, WizardStep};
use tokio::sync::{mpsc, watch};

pub type FetchOutcome = (FetchTicket, Result<TrainingFrameworkDocument, RetrievalError>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Advance,
    Start,
    Stop,
    Retry,
    Restart,
    Quit,
    Unknown(String),
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "" => ShellCommand::Advance,
            "start" => ShellCommand::Start,
            "stop" => ShellCommand::Stop,
            "retry" => ShellCommand::Retry,
            "restart" => ShellCommand::Restart,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => ShellCommand::Unknown(other.to_string()),
        }
    }
}

/// Feedback for a command that changed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    CallControls,
    ResultControls,
    AnswerFromCallStep,
    CallInProgress,
    NoCallToHangUp,
    NothingToRetry,
    HangUpBeforeRestart,
    UnknownCommand(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellUpdate {
    /// The wizard moved to this step.
    Step(WizardStep),
    /// The retrieval state changed; read it through [`TrainerShell::retrieval`].
    Retrieval,
    Hint(Hint),
    Quit,
}

pub struct TrainerShell<A, M, N> {
    controller: SessionController<A, M, N>,
    wizard: Wizard,
    retriever: ArtifactRetriever,
    flows: FlowClient,
    handoff_rx: mpsc::UnboundedReceiver<String>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
}

impl<A, M, N> TrainerShell<A, M, N>
where
    A: VoiceAgent,
    M: MicrophoneGate,
    N: Notifier,
{
    /// Finished fetches are delivered on `fetch_tx` and must be handed back
    /// through [`fetch_finished`](Self::fetch_finished).
    pub fn new(
        agent: A,
        microphone: M,
        notifier: N,
        config: ControllerConfig,
        flows: FlowClient,
        wizard: Wizard,
        fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    ) -> Self {
        let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(agent, microphone, notifier, config)
            .on_conversation_end(move |conversation_id| {
                if handoff_tx.send(conversation_id.to_string()).is_err() {
                    tracing::warn!("conversation {} ended after shutdown", conversation_id);
                }
            });
        Self {
            controller,
            wizard,
            retriever: ArtifactRetriever::new(),
            flows,
            handoff_rx,
            fetch_tx,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.wizard.step()
    }

    pub fn status(&self) -> SessionStatus {
        self.controller.status()
    }

    pub fn retrieval(&self) -> &RetrievalState {
        self.retriever.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.controller.subscribe()
    }

    /// Restarting is refused until the agent has confirmed the call ended.
    pub fn can_restart(&self) -> bool {
        matches!(
            self.controller.status(),
            SessionStatus::Idle | SessionStatus::Disconnected
        )
    }

    /// Shows the first step, fetching straight away when opened on a result.
    pub fn open(&mut self) -> Vec<ShellUpdate> {
        let mut updates = vec![ShellUpdate::Step(self.wizard.step())];
        self.request_framework(&mut updates);
        updates
    }

    pub fn handle_agent_event(&mut self, event: AgentEvent) -> Vec<ShellUpdate> {
        self.controller.handle_event(event);
        let mut updates = Vec::new();
        while let Ok(conversation_id) = self.handoff_rx.try_recv() {
            if self.wizard.conversation_ended(&conversation_id) {
                updates.push(ShellUpdate::Step(self.wizard.step()));
                self.request_framework(&mut updates);
            }
        }
        updates
    }

    pub fn fetch_finished(&mut self, outcome: FetchOutcome) -> Vec<ShellUpdate> {
        let (ticket, result) = outcome;
        if self.retriever.complete(ticket, result) && self.wizard.step() == WizardStep::Result {
            vec![ShellUpdate::Retrieval]
        } else {
            Vec::new()
        }
    }

    pub async fn handle_command(&mut self, command: ShellCommand) -> Vec<ShellUpdate> {
        let hint = |hint| vec![ShellUpdate::Hint(hint)];
        match command {
            ShellCommand::Advance => match self.wizard.step() {
                WizardStep::Welcome | WizardStep::Instructions => {
                    vec![ShellUpdate::Step(self.wizard.advance())]
                }
                WizardStep::Call => hint(Hint::CallControls),
                WizardStep::Result => hint(Hint::ResultControls),
            },
            ShellCommand::Start => {
                if self.wizard.step() != WizardStep::Call {
                    hint(Hint::AnswerFromCallStep)
                } else if !self.can_restart() {
                    hint(Hint::CallInProgress)
                } else {
                    // Failures are already reported through the notifier.
                    if let Err(e) = self.controller.start_session().await {
                        tracing::debug!("start failed: {}", e);
                    }
                    Vec::new()
                }
            }
            ShellCommand::Stop => {
                if !self.controller.can_stop() {
                    hint(Hint::NoCallToHangUp)
                } else {
                    if let Err(e) = self.controller.stop_session().await {
                        tracing::debug!("stop failed: {}", e);
                    }
                    Vec::new()
                }
            }
            ShellCommand::Retry => match self.retriever.retry() {
                Some(ticket) => {
                    self.spawn_fetch(ticket);
                    vec![ShellUpdate::Retrieval]
                }
                None => hint(Hint::NothingToRetry),
            },
            ShellCommand::Restart => {
                if !self.can_restart() {
                    hint(Hint::HangUpBeforeRestart)
                } else {
                    self.wizard.restart();
                    vec![ShellUpdate::Step(self.wizard.step())]
                }
            }
            ShellCommand::Quit => vec![ShellUpdate::Quit],
            ShellCommand::Unknown(other) => hint(Hint::UnknownCommand(other)),
        }
    }

    /// Hangs up an open call before the runtime exits.
    pub async fn shutdown(&mut self) {
        if self.controller.can_stop() {
            if let Err(e) = self.controller.stop_session().await {
                tracing::warn!("failed to hang up on shutdown: {}", e);
            }
        }
    }

    fn request_framework(&mut self, updates: &mut Vec<ShellUpdate>) {
        let Some(conversation_id) = self.wizard.conversation_id().map(str::to_string) else {
            return;
        };
        if let Some(ticket) = self.retriever.request(&conversation_id) {
            self.spawn_fetch(ticket);
        }
        updates.push(ShellUpdate::Retrieval);
    }

    fn spawn_fetch(&self, ticket: FetchTicket) {
        tracing::debug!("fetching training framework for {}", ticket.session_id());
        let flows = self.flows.clone();
        let fetch_tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = flows.fetch(ticket.session_id()).await;
            if fetch_tx.send((ticket, result)).is_err() {
                tracing::debug!("fetch finished after shutdown");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockVoiceAgent;
    use crate::microphone::{MicrophoneGrant, MicrophoneInput, MockMicrophoneGate};
    use crate::notification::Notification;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Shell = TrainerShell<MockVoiceAgent, MockMicrophoneGate, mpsc::UnboundedSender<Notification>>;

    fn granting_microphone() -> MockMicrophoneGate {
        let mut microphone = MockMicrophoneGate::new();
        microphone
            .expect_acquire()
            .returning(|| Ok(MicrophoneGrant::detached(MicrophoneInput::silent())));
        microphone
    }

    fn agent_answering(conversation_id: &'static str) -> MockVoiceAgent {
        let mut agent = MockVoiceAgent::new();
        agent
            .expect_start_session()
            .times(1)
            .returning(move |_, _| Ok(conversation_id.to_string()));
        agent.expect_end_session().times(1).returning(|| Ok(()));
        agent
    }

    async fn flows_server(conversation_id: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/flows/{}", conversation_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Scheduling pediatric cleanings",
                "description": "How the office books cleanings for two children",
                "usage": "",
                "usageContext": "",
                "promptBlockSteps": [{
                    "title": "Greet the caller",
                    "description": "Open the call warmly",
                    "instructions": "Welcome the caller and offer help",
                    "examples": "Hello, Sarah! We'd be happy to help."
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn shell(
        agent: MockVoiceAgent,
        server: &MockServer,
        wizard: Wizard,
    ) -> (Shell, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let flows = FlowClient::new(&server.uri()).unwrap();
        let shell = TrainerShell::new(
            agent,
            granting_microphone(),
            notify_tx,
            ControllerConfig::new("agent-1"),
            flows,
            wizard,
            fetch_tx,
        );
        (shell, fetch_rx)
    }

    async fn next_fetch(fetch_rx: &mut mpsc::UnboundedReceiver<FetchOutcome>) -> FetchOutcome {
        tokio::time::timeout(Duration::from_secs(2), fetch_rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn take_call(shell: &mut Shell) {
        shell.handle_command(ShellCommand::Advance).await;
        shell.handle_command(ShellCommand::Advance).await;
        assert_eq!(shell.step(), WizardStep::Call);
        assert!(shell.handle_command(ShellCommand::Start).await.is_empty());
        assert_eq!(shell.status(), SessionStatus::Connected);
        assert!(shell.handle_command(ShellCommand::Stop).await.is_empty());
        assert_eq!(shell.status(), SessionStatus::Disconnecting);
    }

    fn disconnect() -> AgentEvent {
        AgentEvent::Disconnect { reason: None }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(ShellCommand::parse(""), ShellCommand::Advance);
        assert_eq!(ShellCommand::parse("  START "), ShellCommand::Start);
        assert_eq!(ShellCommand::parse("stop"), ShellCommand::Stop);
        assert_eq!(ShellCommand::parse("retry"), ShellCommand::Retry);
        assert_eq!(ShellCommand::parse("restart"), ShellCommand::Restart);
        assert_eq!(ShellCommand::parse("q"), ShellCommand::Quit);
        assert_eq!(
            ShellCommand::parse("hello"),
            ShellCommand::Unknown("hello".to_string())
        );
    }

    #[tokio::test]
    async fn test_handoff_fetches_framework_once() {
        let server = flows_server("conv_01").await;
        let (mut shell, mut fetch_rx) = shell(agent_answering("conv_01"), &server, Wizard::new());
        assert_eq!(shell.open(), vec![ShellUpdate::Step(WizardStep::Welcome)]);

        take_call(&mut shell).await;
        let updates = shell.handle_agent_event(disconnect());
        assert_eq!(
            updates,
            vec![ShellUpdate::Step(WizardStep::Result), ShellUpdate::Retrieval]
        );
        assert!(shell.retrieval().is_loading());

        let outcome = next_fetch(&mut fetch_rx).await;
        assert_eq!(shell.fetch_finished(outcome), vec![ShellUpdate::Retrieval]);
        let document = shell.retrieval().data().unwrap();
        assert_eq!(document.title, "Scheduling pediatric cleanings");
        assert_eq!(document.steps[0].title, "Greet the caller");

        // A repeated disconnect neither hands off nor fetches again.
        assert!(shell.handle_agent_event(disconnect()).is_empty());
        assert_eq!(
            shell.handle_command(ShellCommand::Retry).await,
            vec![ShellUpdate::Hint(Hint::NothingToRetry)]
        );
        assert!(fetch_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_restart_refused_while_disconnecting() {
        let server = flows_server("conv_02").await;
        let (mut shell, mut fetch_rx) = shell(agent_answering("conv_02"), &server, Wizard::new());

        take_call(&mut shell).await;
        assert!(!shell.can_restart());
        assert_eq!(
            shell.handle_command(ShellCommand::Restart).await,
            vec![ShellUpdate::Hint(Hint::HangUpBeforeRestart)]
        );
        assert_eq!(shell.step(), WizardStep::Call);

        let updates = shell.handle_agent_event(disconnect());
        assert_eq!(updates[0], ShellUpdate::Step(WizardStep::Result));
        let outcome = next_fetch(&mut fetch_rx).await;
        shell.fetch_finished(outcome);
        assert!(shell.retrieval().data().is_some());

        assert!(shell.can_restart());
        assert_eq!(
            shell.handle_command(ShellCommand::Restart).await,
            vec![ShellUpdate::Step(WizardStep::Welcome)]
        );
    }

    #[tokio::test]
    async fn test_opening_on_earlier_conversation_fetches_it() {
        let server = flows_server("abc123").await;
        let (mut shell, mut fetch_rx) =
            shell(MockVoiceAgent::new(), &server, Wizard::for_conversation("abc123"));

        assert_eq!(
            shell.open(),
            vec![ShellUpdate::Step(WizardStep::Result), ShellUpdate::Retrieval]
        );
        let outcome = next_fetch(&mut fetch_rx).await;
        assert_eq!(shell.fetch_finished(outcome), vec![ShellUpdate::Retrieval]);
        assert!(shell.retrieval().data().is_some());
    }

    #[tokio::test]
    async fn test_commands_outside_their_step_only_hint() {
        let server = MockServer::start().await;
        let mut agent = MockVoiceAgent::new();
        agent.expect_start_session().never();
        let (mut shell, _fetch_rx) = shell(agent, &server, Wizard::new());

        assert_eq!(
            shell.handle_command(ShellCommand::Start).await,
            vec![ShellUpdate::Hint(Hint::AnswerFromCallStep)]
        );
        assert_eq!(
            shell.handle_command(ShellCommand::Stop).await,
            vec![ShellUpdate::Hint(Hint::NoCallToHangUp)]
        );
        assert_eq!(
            shell.handle_command(ShellCommand::Unknown("dance".to_string())).await,
            vec![ShellUpdate::Hint(Hint::UnknownCommand("dance".to_string()))]
        );
        assert_eq!(
            shell.handle_command(ShellCommand::Quit).await,
            vec![ShellUpdate::Quit]
        );
        assert_eq!(shell.step(), WizardStep::Welcome);
    }
}
