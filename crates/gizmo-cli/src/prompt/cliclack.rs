use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::style;

use gizmo::orchestrator::TurnEvent;
use gizmo::tools::{ThemeList, ToolCall, ToolOutput};
use gizmo::weather::{WeatherOutcome, WeatherReport};

use super::{Input, InputType, Prompt, Theme};

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    input_mode: InputMode,
    theme: Theme,
}

enum InputMode {
    Singleline,
    Multiline,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            input_mode: InputMode::Multiline,
            theme: Theme::Dark,
        }
    }

    fn bat_theme(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

fn print_tool_request(content: &str, theme: &str, tool_name: &str) {
    bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(content.as_bytes()).name(format!("Tool Request: {}", tool_name)),
        )
        .theme(theme)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .unwrap();
}

fn print_tool_response(content: &str, theme: &str, language: &str) {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name("Tool Response:"))
        .theme(theme)
        .language(language)
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .unwrap();
}

fn print(content: &str, theme: &str) {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .unwrap();
}

fn print_newline() {
    println!();
}

/// Markdown view of a weather report, one panel per lookup.
fn weather_markdown(report: &WeatherReport) -> String {
    let mut out = format!(
        "# {}, {}\n{} ({}°C, feels like {}°C)\n\n",
        report.location, report.country, report.description, report.temperature, report.feels_like
    );
    out.push_str(&format!("- Humidity: {}%\n", report.humidity));
    out.push_str(&format!("- Pressure: {} hPa\n", report.pressure));
    out.push_str(&format!("- Wind: {} m/s\n", report.wind.speed));
    out.push_str(&format!("- Clouds: {}%\n", report.clouds));
    out.push_str(&format!("- Visibility: {} m\n", report.visibility));
    out
}

/// The theme choices, in the order the picker offers them.
fn themes_markdown(list: &ThemeList) -> String {
    let mut out = String::from("Available themes:\n\n");
    for option in &list.themes {
        out.push_str(&format!("- **{}**\n", option.name));
    }
    out
}

impl Prompt for CliclackPrompt {
    fn render_event(&mut self, event: &TurnEvent) {
        let theme = self.bat_theme();

        match event {
            TurnEvent::TextDelta(text) => print(text, theme),
            TurnEvent::ToolCall { call, .. } => match call {
                Ok(call) => {
                    let arguments = serde_json::to_string_pretty(&call.arguments())
                        .unwrap_or_else(|_| "{}".to_string());
                    print_tool_request(&arguments, theme, call.name());
                }
                Err(e) => print(&e.to_string(), theme),
            },
            TurnEvent::ToolResult { outcome, .. } => match outcome {
                Ok(ToolOutput::Weather(WeatherOutcome::Report(report))) => {
                    print_tool_response(&weather_markdown(report), theme, "Markdown");
                }
                Ok(ToolOutput::Weather(WeatherOutcome::Error { error })) => {
                    print_tool_response(error, theme, "Markdown");
                }
                Ok(ToolOutput::Themes(list)) => {
                    print_tool_response(&themes_markdown(list), theme, "Markdown");
                }
                Ok(ToolOutput::Confirmation(answer)) => print(answer.as_str(), theme),
                Ok(ToolOutput::SelfDestruct(notice)) => {
                    println!("{}", style(&notice.message).red().bold());
                }
                Err(e) => print(&e.to_string(), theme),
            },
            TurnEvent::TurnError(e) => {
                println!("{}", style(format!("Error: {}", e)).red());
            }
            TurnEvent::Finished(_) => {
                print_newline();
                io::stdout().flush().expect("Failed to flush stdout");
            }
        }
    }

    fn render_note(&mut self, note: &str) {
        print(note, self.bat_theme());
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("awaiting reply");
    }

    fn hide_busy(&self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let mut input = input("Gizmo Chat: [o_o]         [Help: /?]").placeholder("");
        match self.input_mode {
            InputMode::Multiline => input = input.multiline(),
            InputMode::Singleline => (),
        }
        let mut message_text: String = input.interact()?;
        message_text = message_text.trim().to_string();

        if message_text.eq_ignore_ascii_case("/exit") || message_text.eq_ignore_ascii_case("/quit")
        {
            return Ok(Input {
                input_type: InputType::Exit,
                content: None,
            });
        } else if message_text.eq_ignore_ascii_case("/m") {
            self.input_mode = InputMode::Multiline;
            return self.get_input();
        } else if message_text.eq_ignore_ascii_case("/s") {
            self.input_mode = InputMode::Singleline;
            return self.get_input();
        } else if message_text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            return self.get_input();
        } else if message_text.eq_ignore_ascii_case("/?") {
            println!("Commands:");
            println!("/exit - Exit the session");
            println!("/m - Switch to multiline input mode");
            println!("/s - Switch to singleline input mode");
            println!("/t - Toggle Light/Dark theme");
            println!("/? - Display this help message");
            println!("Ctrl+C - Interrupt gizmo (resets the interaction to before the interrupted user request)");
            return self.get_input();
        } else {
            return Ok(Input {
                input_type: InputType::Message,
                content: Some(message_text.to_string()),
            });
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(cliclack::confirm(message).initial_value(true).interact()?)
    }

    fn close(&self) {
        // No cleanup required
    }
}
