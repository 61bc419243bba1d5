use super::CommandResult;
use crate::core::app::App;

pub type CommandHandler = fn(&mut App, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

impl<'a> CommandInvocation<'a> {
    pub fn arg_list(&self) -> Vec<&'a str> {
        self.args.split_whitespace().collect()
    }
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "endpoint",
        usage: "/endpoint [gemini|openai]",
        help: "Show or switch the backend.",
        handler: super::handle_endpoint,
    },
    Command {
        name: "model",
        usage: "/model [name]",
        help: "Show or switch the model for the current backend.",
        handler: super::handle_model,
    },
    Command {
        name: "models",
        usage: "/models",
        help: "List models for the current backend.",
        handler: super::handle_models,
    },
    Command {
        name: "pdf",
        usage: "/pdf [on|off]",
        help: "Toggle document chat mode.",
        handler: super::handle_pdf,
    },
    Command {
        name: "docs",
        usage: "/docs <path...>",
        help: "Upload text documents for document chat.",
        handler: super::handle_docs,
    },
    Command {
        name: "retrieve",
        usage: "/retrieve <1-10>",
        help: "Number of document chunks added to each turn.",
        handler: super::handle_retrieve,
    },
    Command {
        name: "chunking",
        usage: "/chunking <size> <overlap>",
        help: "Chunk size and overlap for future uploads.",
        handler: super::handle_chunking,
    },
    Command {
        name: "memory",
        usage: "/memory <n>",
        help: "Number of previous exchanges sent with each turn.",
        handler: super::handle_memory,
    },
    Command {
        name: "image",
        usage: "/image [path]",
        help: "Attach a JPEG or PNG to the next message, or clear it.",
        handler: super::handle_image,
    },
    Command {
        name: "audio",
        usage: "/audio <path>",
        help: "Transcribe an audio file and send it as a message.",
        handler: super::handle_audio,
    },
    Command {
        name: "new",
        usage: "/new",
        help: "Start a new conversation.",
        handler: super::handle_new,
    },
    Command {
        name: "delete",
        usage: "/delete",
        help: "Delete the stored history of this conversation and start over.",
        handler: super::handle_delete,
    },
    Command {
        name: "sessions",
        usage: "/sessions",
        help: "List stored conversations.",
        handler: super::handle_sessions,
    },
    Command {
        name: "load",
        usage: "/load <key>",
        help: "Continue a stored conversation.",
        handler: super::handle_load,
    },
    Command {
        name: "log",
        usage: "/log [filename]",
        help: "Toggle transcript logging or set the log file.",
        handler: super::handle_log,
    },
    Command {
        name: "logout",
        usage: "/logout",
        help: "Log out and return to the login prompt.",
        handler: super::handle_logout,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Exit mmchat.",
        handler: super::handle_quit,
    },
];
