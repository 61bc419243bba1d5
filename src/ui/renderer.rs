use std::io::{self, Write};

use crate::core::message::{Message, Role};

/// Print a transcript entry with its role prefix. User messages carry the
/// logged-in username when there is one.
pub fn render_message<W: Write>(out: &mut W, message: &Message, user_name: Option<&str>) -> io::Result<()> {
    let prefix = match (message.role, user_name) {
        (Role::User, Some(name)) => name,
        (role, _) => role.avatar(),
    };
    let mut lines = message.content.lines();
    writeln!(out, "{prefix}: {}", lines.next().unwrap_or_default())?;
    let indent = " ".repeat(prefix.chars().count() + 2);
    for line in lines {
        if line.is_empty() {
            writeln!(out)?;
        } else {
            writeln!(out, "{indent}{line}")?;
        }
    }
    writeln!(out)
}

pub fn render_transcript<W: Write>(out: &mut W, messages: &[Message], user_name: Option<&str>) -> io::Result<()> {
    for message in messages {
        render_message(out, message, user_name)?;
    }
    Ok(())
}

pub fn render_notice<W: Write>(out: &mut W, notice: &str) -> io::Result<()> {
    for line in notice.lines() {
        writeln!(out, "· {line}")?;
    }
    Ok(())
}

pub fn render_error<W: Write>(out: &mut W, error: &dyn std::error::Error) -> io::Result<()> {
    writeln!(out, "❌ {error}")
}

pub fn render_banner<W: Write>(out: &mut W, endpoint: &str, model: &str) -> io::Result<()> {
    writeln!(out, "mmchat {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "Endpoint: {endpoint}  Model: {model}")?;
    writeln!(out, "Type /help for commands, /quit to exit.")?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(message: &Message, user: Option<&str>) -> String {
        let mut out = Vec::new();
        render_message(&mut out, message, user).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn roles_are_prefixed() {
        assert_eq!(render(&Message::user("Hello"), None), "You: Hello\n\n");
        assert_eq!(render(&Message::user("Hello"), Some("alice")), "alice: Hello\n\n");
        assert_eq!(
            render(&Message::assistant("Hi there!"), Some("alice")),
            "Assistant: Hi there!\n\n"
        );
    }

    #[test]
    fn continuation_lines_are_indented() {
        assert_eq!(
            render(&Message::assistant("one\n\ntwo"), None),
            "Assistant: one\n\n           two\n\n"
        );
    }

    #[test]
    fn notices_get_a_marker_per_line() {
        let mut out = Vec::new();
        render_notice(&mut out, "Models:\n* gpt-4").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "· Models:\n· * gpt-4\n");
    }
}
