use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationChoice {
    Yes,
    No,
    Cancel,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct UiError {
    message: String,
}

impl UiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<io::Error> for UiError {
    fn from(err: io::Error) -> Self {
        UiError::new(err.to_string())
    }
}

fn read_answer(prompt: &str) -> Result<String, UiError> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Err(UiError::new("Input closed"));
    }
    Ok(input)
}

pub fn prompt_token(display_name: &str) -> Result<String, UiError> {
    println!("🔐 {display_name} authentication");
    let token = read_answer("Enter your API token: ")?;
    parse_token(&token)
}

pub fn prompt_confirmation(question: &str) -> Result<ConfirmationChoice, UiError> {
    parse_confirmation(&read_answer(question)?)
}

pub fn parse_token(input: &str) -> Result<String, UiError> {
    let token = input.trim();
    if token.is_empty() {
        return Err(UiError::new("Token cannot be empty"));
    }
    Ok(token.to_string())
}

pub fn parse_confirmation(input: &str) -> Result<ConfirmationChoice, UiError> {
    match input.trim().to_lowercase().as_str() {
        "" | "n" | "no" => Ok(ConfirmationChoice::No),
        "y" | "yes" => Ok(ConfirmationChoice::Yes),
        "c" | "cancel" => Ok(ConfirmationChoice::Cancel),
        _ => Err(UiError::new("Invalid confirmation response")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_defaults_to_no() {
        assert_eq!(parse_confirmation("\n").unwrap(), ConfirmationChoice::No);
        assert_eq!(parse_confirmation(" YES ").unwrap(), ConfirmationChoice::Yes);
        assert_eq!(parse_confirmation("c").unwrap(), ConfirmationChoice::Cancel);
        assert!(parse_confirmation("maybe").is_err());
    }

    #[test]
    fn token_is_trimmed_and_required() {
        assert_eq!(parse_token("  sk-abc \n").unwrap(), "sk-abc");
        assert!(parse_token("\n").is_err());
    }
}
