//! Plain-text rendering for the terminal wizard.

use callflow_core::notification::{Notification, NotificationVariant};
use callflow_core::retriever::RetrievalState;
use callflow_core::session::{SessionSnapshot, SessionStatus};
use callflow_core::shell::Hint;
use callflow_core::wizard::WizardStep;
use callflow_core::TrainingFrameworkDocument;
use std::fmt::Write;

const RULE: &str = "----------------------------------------------------------------";

pub fn step_screen(step: WizardStep) -> String {
    let body = match step {
        WizardStep::Welcome => {
            "Practice handling a patient's phone call, then review the training framework\n\
             our analysis builds from the conversation.\n\n\
             Press enter to continue."
        }
        WizardStep::Instructions => {
            "An AI agent will call the office as a parent who wants to book dental cleanings\n\
             for two children. Answer as the front desk would: greet the caller, find the\n\
             patient record, offer appointment times and confirm the booking.\n\n\
             Press enter when you are ready to take the call."
        }
        WizardStep::Call => {
            "Type `start` to answer the call and `stop` to hang up.\n\
             The training framework is fetched once the call has ended."
        }
        WizardStep::Result => {
            "Type `retry` to fetch the training framework again, `restart` to take another\n\
             call or `quit` to exit."
        }
    };
    format!("{}\n{}\n{}\n{}", RULE, step.title(), RULE, body)
}

pub fn hint(hint: &Hint) -> String {
    match hint {
        Hint::CallControls => "Type `start` to answer the call or `stop` to hang up.".to_string(),
        Hint::ResultControls => "Type `retry`, `restart` or `quit`.".to_string(),
        Hint::AnswerFromCallStep => {
            format!("Calls are answered from the {} step.", WizardStep::Call.title())
        }
        Hint::CallInProgress => "A call is already in progress.".to_string(),
        Hint::NoCallToHangUp => "There is no call to hang up.".to_string(),
        Hint::NothingToRetry => "Nothing to retry.".to_string(),
        Hint::HangUpBeforeRestart => {
            "Hang up with `stop` and wait for the call to end before restarting.".to_string()
        }
        Hint::UnknownCommand(other) => format!(
            "Unknown command {:?}. Commands: start, stop, retry, restart, quit, or enter to continue.",
            other
        ),
    }
}

pub fn notification(notification: &Notification) -> String {
    let marker = match notification.variant {
        NotificationVariant::Default => "*",
        NotificationVariant::Destructive => "!",
    };
    match &notification.description {
        Some(description) => format!("[{}] {}: {}", marker, notification.title, description),
        None => format!("[{}] {}", marker, notification.title),
    }
}

pub fn session(snapshot: &SessionSnapshot) -> String {
    let mut line = format!("Status: {}", snapshot.status);
    if snapshot.status == SessionStatus::Connected {
        let mode = if snapshot.is_agent_speaking {
            "Agent is speaking"
        } else {
            "Agent is listening"
        };
        line.push_str(" | ");
        line.push_str(mode);
    }
    line
}

pub fn document(document: &TrainingFrameworkDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", document.title);
    let _ = writeln!(out, "{}", document.description);
    for (index, step) in document.steps.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}. {}", index + 1, step.title);
        let _ = writeln!(out, "   {}", step.description);
        let _ = writeln!(out, "   Instructions: {}", step.instructions);
        let _ = writeln!(out, "   Example: {}", step.examples);
    }
    out
}

pub fn retrieval(state: &RetrievalState) -> String {
    match state {
        RetrievalState::Idle => "No conversation to analyse yet.".to_string(),
        RetrievalState::Loading => "Loading training framework...".to_string(),
        RetrievalState::Loaded(loaded) => document(loaded),
        RetrievalState::Failed(error) => format!("Error: {}\nType `retry` to try again.", error),
    }
}
