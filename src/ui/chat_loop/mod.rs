//! Interactive chat loop.
//!
//! Reads one line at a time, routes slash commands through
//! [`crate::commands::process_input`] and everything else through a chat turn,
//! then prints whatever changed.

mod setup;

pub use self::setup::{bootstrap_app, build_service, initial_session, ChatOptions, StartupError};

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::auth;
use crate::commands::{process_input, CommandResult};
use crate::core::app::App;
use crate::ui::renderer::{render_banner, render_error, render_message, render_notice};

pub async fn run_chat(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let app = bootstrap_app(options)?;
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    let app = drive(app, stdin, &mut stdout).await?;
    app.service.db().clone().close();
    Ok(())
}

/// Run the loop until `/quit` or end of input and hand the app back.
pub async fn drive<R, W>(mut app: App, input: R, out: &mut W) -> io::Result<App>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    render_banner(out, &app.session.endpoint_to_use, &app.session.model_to_use)?;

    loop {
        if !app.session.logged_in {
            write!(out, "Username: ")?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match auth::login(&mut app.session, app.authenticator.as_ref(), &line) {
                Ok(()) => writeln!(
                    out,
                    "Welcome, {}!\n",
                    app.session.username.as_deref().unwrap_or_default()
                )?,
                Err(err) => render_error(out, &err)?,
            }
            continue;
        }

        write!(out, "{}> ", app.user_display_name())?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = process_input(&mut app, &line);
        flush_notices(&mut app, out)?;
        match command {
            CommandResult::Continue | CommandResult::Logout => {}
            CommandResult::Quit => break,
            CommandResult::ProcessAsMessage(text) => {
                if !text.trim().is_empty() {
                    send_turn(&mut app, &text, out).await?;
                }
            }
            CommandResult::Transcribe(path) => match app.transcribe(&path).await {
                Ok(text) => {
                    render_notice(out, &format!("Transcribed: {text}"))?;
                    send_turn(&mut app, &text, out).await?;
                }
                Err(err) => render_error(out, &err)?,
            },
        }
    }

    debug!("chat loop finished");
    Ok(app)
}

async fn send_turn<W: Write>(app: &mut App, text: &str, out: &mut W) -> io::Result<()> {
    match app.send(text).await {
        Ok(transcript) => {
            if let Some(reply) = transcript.last() {
                render_message(out, reply, None)?;
            }
        }
        Err(err) => render_error(out, &err)?,
    }
    flush_notices(app, out)
}

fn flush_notices<W: Write>(app: &mut App, out: &mut W) -> io::Result<()> {
    for notice in app.take_notices() {
        render_notice(out, &notice)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::core::models::Endpoint;
    use crate::utils::test_utils::{create_test_app, MockBackend};

    async fn run(app: App, input: &str) -> (App, String) {
        let mut out = Vec::new();
        let app = drive(app, input.as_bytes(), &mut out).await.unwrap();
        (app, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn login_then_chat_then_quit() {
        let app = create_test_app(MockBackend::replying(Endpoint::Gemini, "Hi there!"));
        let (app, output) = run(app, "alice\nHello\n/quit\nnever read\n").await;

        assert!(output.contains("Welcome, alice!"));
        assert!(output.contains("Assistant: Hi there!"));
        assert_eq!(
            app.session.messages,
            vec![Message::user("Hello"), Message::assistant("Hi there!")]
        );
    }

    #[tokio::test]
    async fn empty_username_is_rejected() {
        let app = create_test_app(MockBackend::replying(Endpoint::Gemini, "x"));
        let (app, output) = run(app, "   \n").await;
        assert!(output.contains("username must not be empty"));
        assert!(!app.session.logged_in);
    }

    #[tokio::test]
    async fn failed_turn_shows_error_and_keeps_going() {
        let app = create_test_app(MockBackend::failing(Endpoint::Gemini, "quota exceeded"));
        let (app, output) = run(app, "bob\nHello\n/pdf on\n").await;

        assert!(output.contains("❌ gemini request failed with status 429: quota exceeded"));
        assert!(output.contains("Document chat on"));
        assert_eq!(app.session.messages, vec![Message::user("Hello")]);
        assert!(app.session.pdf_chat);
    }

    #[tokio::test]
    async fn logout_returns_to_login_prompt() {
        let app = create_test_app(MockBackend::replying(Endpoint::Gemini, "x"));
        let (app, output) = run(app, "alice\n/logout\ncarol\n").await;
        assert!(output.contains("Logged out"));
        assert_eq!(app.session.username.as_deref(), Some("carol"));
    }
}
