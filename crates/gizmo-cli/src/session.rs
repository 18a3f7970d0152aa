use anyhow::Result;
use tokio::sync::mpsc;

use crate::prompt::{InputType, Prompt};
use gizmo::orchestrator::{Orchestrator, TurnEvent};
use gizmo::tools::ConfirmationAnswer;
use gizmo::transcript::Transcript;

pub struct Session<'a> {
    orchestrator: Orchestrator,
    prompt: Box<dyn Prompt + 'a>,
    transcript: Transcript,
}

impl<'a> Session<'a> {
    pub fn new(orchestrator: Orchestrator, prompt: Box<impl Prompt + 'a>) -> Self {
        Session {
            orchestrator,
            prompt,
            transcript: Transcript::new(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.gizmo_ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = &input.content {
                        self.transcript.push_user(content.as_str());
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }

            self.run_turn().await;
            self.settle_confirmations().await;
        }
        self.prompt.close();
        Ok(())
    }

    /// Process a single message and return, without entering the input loop.
    /// Confirmations nobody is around to answer stay pending and are
    /// reported as such.
    pub async fn headless_start(&mut self, initial_message: String) -> Result<()> {
        self.transcript.push_user(initial_message);

        self.run_turn().await;

        for (_, message) in self.transcript.pending_confirmations() {
            self.prompt
                .render_note(&format!("Pending confirmation (unanswered): {}\n", message));
        }
        self.prompt.close();
        Ok(())
    }

    /// Run one turn over the transcript, rendering events as they arrive.
    /// Ctrl+C aborts the turn and resets the transcript to before the
    /// interrupted user message.
    async fn run_turn(&mut self) {
        self.prompt.show_busy();

        let (tx, mut rx) = mpsc::channel(32);
        let orchestrator = self.orchestrator.clone();
        let history = self.transcript.messages().to_vec();
        let worker = tokio::spawn(async move { orchestrator.run_turn(&history, tx).await });

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => {
                            let finished = matches!(event, TurnEvent::Finished(_));
                            self.prompt.render_event(&event);
                            self.transcript.apply(&event);
                            if finished {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    worker.abort();
                    self.transcript.rollback_last_exchange();
                    self.prompt.render_note(" Interrupt: Resetting conversation to before the last sent message...\n");
                    break;
                }
            }
        }

        self.prompt.hide_busy();
    }

    /// Ask the user to answer every confirmation the turn left open, then
    /// run a continuation turn so the model sees the answers. The model may
    /// ask again, so loop until a turn ends with nothing pending. Cancelling
    /// the prompt leaves the confirmation open and returns to the input loop.
    async fn settle_confirmations(&mut self) {
        loop {
            let pending = self.transcript.pending_confirmations();
            if pending.is_empty() {
                break;
            }

            for (id, message) in pending {
                let approved = match self.prompt.confirm(&message) {
                    Ok(approved) => approved,
                    Err(_) => return,
                };
                let answer = if approved {
                    ConfirmationAnswer::Confirmed
                } else {
                    ConfirmationAnswer::Denied
                };
                self.transcript.resolve_confirmation(&id, answer);
                self.prompt.render_note(&format!("{}\n", answer.as_str()));
            }

            self.run_turn().await;
        }
    }
}
