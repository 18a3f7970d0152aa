use anyhow::Result;

use gizmo::orchestrator::TurnEvent;

pub mod cliclack;

pub trait Prompt {
    fn render_event(&mut self, event: &TurnEvent);
    fn render_note(&mut self, note: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn confirm(&mut self, message: &str) -> Result<bool>;
    fn show_busy(&mut self);
    fn hide_busy(&self);
    fn close(&self);
    fn gizmo_ready(&self) {
        println!("\n");
        println!("Gizmo is running! Ask about the weather, change the theme, or just chat.");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

pub enum Theme {
    Light,
    Dark,
}
