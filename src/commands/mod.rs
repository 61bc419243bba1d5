//! Slash commands accepted by the chat loop.

mod registry;

pub use registry::{all_commands, find_command, CommandInvocation};

use std::path::PathBuf;

use crate::auth;
use crate::core::app::App;
use crate::core::backends::ImageAttachment;
use crate::core::models::Endpoint;
use crate::documents::{add_documents_to_db, UploadedFile};

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    /// Transcribe the file and send the text as the next message.
    Transcribe(PathBuf),
    Logout,
    Quit,
}

pub fn process_input(app: &mut App, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match find_command(command_name) {
        Some(command) => (command.handler)(
            app,
            CommandInvocation {
                input: trimmed,
                args,
            },
        ),
        None => {
            app.notify(format!(
                "Unknown command /{command_name}. Type /help for the list."
            ));
            CommandResult::Continue
        }
    }
}

fn parse_number(app: &mut App, value: &str, usage: &str) -> Option<usize> {
    match value.parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            app.notify(format!("Usage: {usage}"));
            None
        }
    }
}

pub(super) fn handle_help(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let mut help = String::from("Commands:");
    for command in all_commands() {
        help.push_str(&format!("\n  {:<28} {}", command.usage, command.help));
    }
    app.notify(help);
    CommandResult::Continue
}

pub(super) fn handle_endpoint(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let names: Vec<&str> = Endpoint::ALL.iter().map(|e| e.as_str()).collect();
        app.notify(format!(
            "Endpoint: {} (available: {})",
            app.session.endpoint_to_use,
            names.join(", ")
        ));
        return CommandResult::Continue;
    }
    match invocation.args.parse::<Endpoint>() {
        Ok(endpoint) => {
            let catalog = app.service.dispatcher().catalog();
            app.session.set_endpoint(endpoint, catalog);
            let model = if app.session.model_to_use.is_empty() {
                "none".to_string()
            } else {
                app.session.model_to_use.clone()
            };
            app.notify(format!(
                "Endpoint set to {} (model: {model})",
                endpoint.display_name()
            ));
        }
        Err(err) => app.notify(err.to_string()),
    }
    CommandResult::Continue
}

pub(super) fn handle_model(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        return handle_models(app, invocation);
    }
    let catalog = app.service.dispatcher().catalog();
    match app.session.set_model(invocation.args, catalog) {
        Ok(()) => app.notify(format!("Model set to {}", invocation.args)),
        Err(err) => app.notify(err.to_string()),
    }
    CommandResult::Continue
}

pub(super) fn handle_models(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    if app.session.model_options.is_empty() {
        app.notify(format!(
            "No models available for '{}'",
            app.session.endpoint_to_use
        ));
        return CommandResult::Continue;
    }
    let lines: Vec<String> = app
        .session
        .model_options
        .iter()
        .map(|model| {
            let marker = if *model == app.session.model_to_use { "*" } else { " " };
            format!("{marker} {model}")
        })
        .collect();
    app.notify(format!("Models:\n{}", lines.join("\n")));
    CommandResult::Continue
}

pub(super) fn handle_pdf(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    match invocation.args.to_ascii_lowercase().as_str() {
        "on" => {
            app.session.toggle_pdf_chat(app.service.dispatcher().cache());
            if app.documents.is_empty() {
                app.notify("Document chat on. Upload files with /docs <path...>.");
            } else {
                app.notify(format!(
                    "Document chat on ({} chunks indexed)",
                    app.documents.len()
                ));
            }
        }
        "off" => {
            app.session.detoggle_pdf_chat();
            app.notify("Document chat off");
        }
        "" => {
            let state = if app.session.pdf_chat { "on" } else { "off" };
            app.notify(format!("Document chat is {state}"));
        }
        _ => app.notify("Usage: /pdf [on|off]"),
    }
    CommandResult::Continue
}

pub(super) fn handle_docs(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let paths = invocation.arg_list();
    if paths.is_empty() {
        app.notify("Usage: /docs <path...>");
        return CommandResult::Continue;
    }
    let files: Result<Vec<UploadedFile>, _> = paths
        .iter()
        .map(|path| UploadedFile::from_path(PathBuf::from(path).as_path()))
        .collect();
    let result = files.and_then(|files| {
        add_documents_to_db(app.documents.as_ref(), &files, &app.session).map(|n| (files.len(), n))
    });
    match result {
        Ok((files, chunks)) => app.notify(format!("Indexed {files} file(s) into {chunks} chunk(s)")),
        Err(err) => app.notify(format!("Upload failed: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_retrieve(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.notify(format!(
            "Retrieving {} chunk(s) per turn",
            app.session.retrieved_documents
        ));
        return CommandResult::Continue;
    }
    if let Some(n) = parse_number(app, invocation.args, "/retrieve <1-10>") {
        match app.session.set_retrieved_documents(n) {
            Ok(()) => app.notify(format!("Retrieving {n} chunk(s) per turn")),
            Err(err) => app.notify(err.to_string()),
        }
    }
    CommandResult::Continue
}

pub(super) fn handle_chunking(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    const USAGE: &str = "/chunking <size> <overlap>";
    let args = invocation.arg_list();
    if args.is_empty() {
        app.notify(format!(
            "Chunk size {} with overlap {}",
            app.session.chunk_size, app.session.chunk_overlap
        ));
        return CommandResult::Continue;
    }
    if args.len() != 2 {
        app.notify(format!("Usage: {USAGE}"));
        return CommandResult::Continue;
    }
    let (Some(size), Some(overlap)) = (
        parse_number(app, args[0], USAGE),
        parse_number(app, args[1], USAGE),
    ) else {
        return CommandResult::Continue;
    };
    match app.session.set_chunking(size, overlap) {
        Ok(()) => app.notify(format!("Chunk size {size} with overlap {overlap}")),
        Err(err) => app.notify(err.to_string()),
    }
    CommandResult::Continue
}

pub(super) fn handle_memory(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.notify(format!(
            "Sending the last {} exchange(s)",
            app.session.chat_memory_length
        ));
        return CommandResult::Continue;
    }
    if let Some(n) = parse_number(app, invocation.args, "/memory <n>") {
        match app.session.set_chat_memory_length(n) {
            Ok(()) => app.notify(format!("Sending the last {n} exchange(s)")),
            Err(err) => app.notify(err.to_string()),
        }
    }
    CommandResult::Continue
}

pub(super) fn handle_image(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        if app.pending_image.take().is_some() {
            app.notify("Image detached");
        } else {
            app.notify("Usage: /image <path>");
        }
        return CommandResult::Continue;
    }
    match ImageAttachment::from_path(PathBuf::from(invocation.args).as_path()) {
        Ok(image) => {
            app.notify(format!(
                "Attached {} ({}) to the next message",
                invocation.args, image.mime_type
            ));
            app.pending_image = Some(image);
        }
        Err(err) => app.notify(err.to_string()),
    }
    CommandResult::Continue
}

pub(super) fn handle_audio(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.notify("Usage: /audio <path>");
        return CommandResult::Continue;
    }
    CommandResult::Transcribe(PathBuf::from(invocation.args))
}

pub(super) fn handle_new(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.session.start_new_session();
    app.pending_image = None;
    app.notify("Started a new conversation");
    CommandResult::Continue
}

pub(super) fn handle_delete(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let deleted = app.session.current_session_key().map(str::to_string);
    match app.service.delete_chat_session_history(&mut app.session) {
        Ok(()) => match deleted {
            Some(key) => app.notify(format!("Deleted conversation {key}")),
            None => app.notify("Nothing stored yet; started a new conversation"),
        },
        Err(err) => app.notify(format!("Delete failed: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_sessions(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    match app.service.list_sessions() {
        Ok(keys) if keys.is_empty() => app.notify("No stored conversations"),
        Ok(keys) => {
            let current = app.session.current_session_key().map(str::to_string);
            let lines: Vec<String> = keys
                .iter()
                .map(|key| {
                    let marker = if current.as_deref() == Some(key.as_str()) { "*" } else { " " };
                    format!("{marker} {key}")
                })
                .collect();
            app.notify(format!("Stored conversations:\n{}", lines.join("\n")));
        }
        Err(err) => app.notify(format!("Could not list conversations: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_load(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.notify("Usage: /load <key>");
        return CommandResult::Continue;
    }
    match app.service.load_session(&mut app.session, invocation.args) {
        Ok(0) => app.notify(format!("No messages stored under {}", invocation.args)),
        Ok(count) => {
            let user_name = app.user_display_name().to_string();
            if let Err(err) = app.transcript.rewrite(&app.session.messages, &user_name) {
                app.notify(format!("Log error: {err}"));
            }
            app.notify(format!("Loaded {count} message(s) from {}", invocation.args));
        }
        Err(err) => app.notify(format!("Load failed: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_log(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let args = invocation.arg_list();
    let result = match args.as_slice() {
        [] => app.transcript.toggle(),
        [path] => app.transcript.set_log_file(*path),
        _ => {
            app.notify("Usage: /log [filename]");
            return CommandResult::Continue;
        }
    };
    match result {
        Ok(message) => app.notify(message),
        Err(err) => app.notify(format!("Log error: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_logout(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    auth::logout(&mut app.session);
    app.notify("Logged out");
    CommandResult::Logout
}

pub(super) fn handle_quit(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
