/// Value detail requested from `-stack-list-variables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuesMode {
    /// `--all-values`: name and value, no type.
    All,
    /// `--simple-values`: name and type, values only for scalars.
    Simple,
}

impl ValuesMode {
    fn flag(self) -> &'static str {
        match self {
            ValuesMode::All => "--all-values",
            ValuesMode::Simple => "--simple-values",
        }
    }
}

/// The MI commands the bridge issues on its own behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum MiCommand {
    ExecStep,
    ExecNext,
    ExecRun,
    StackListFrames,
    StackListVariables {
        thread: u32,
        frame: u32,
        values: ValuesMode,
    },
    Evaluate {
        thread: u32,
        frame: u32,
        expression: String,
    },
    /// Literal command text typed by a user, e.g. `-exec-continue`.
    Raw(String),
}

impl MiCommand {
    /// Command text without a token.
    pub fn render(&self) -> String {
        match self {
            MiCommand::ExecStep => "-exec-step".to_string(),
            MiCommand::ExecNext => "-exec-next".to_string(),
            MiCommand::ExecRun => "-exec-run".to_string(),
            MiCommand::StackListFrames => "-stack-list-frames".to_string(),
            MiCommand::StackListVariables {
                thread,
                frame,
                values,
            } => format!(
                "-stack-list-variables --thread {} --frame {} {}",
                thread,
                frame,
                values.flag()
            ),
            MiCommand::Evaluate {
                thread,
                frame,
                expression,
            } => format!(
                "-data-evaluate-expression --thread {} --frame {} {}",
                thread, frame, expression
            ),
            MiCommand::Raw(text) => text.trim().to_string(),
        }
    }

    /// Whether the command can carry a correlation token.
    ///
    /// Only MI commands (leading `-`) accept one; console commands such as
    /// `skip -gfi foo.h` are sent bare.
    pub fn accepts_token(&self) -> bool {
        match self {
            MiCommand::Raw(text) => text.trim_start().starts_with('-'),
            _ => true,
        }
    }

    /// Wire text `"<token>-<command> [args]"`, or bare text when no token applies.
    pub fn tokened(&self, token: u64) -> String {
        let text = self.render();
        if self.accepts_token() {
            format!("{}{}", token, text)
        } else {
            text
        }
    }

    /// Address-of expression for a named variable.
    pub fn address_of(thread: u32, frame: u32, name: &str) -> Self {
        MiCommand::Evaluate {
            thread,
            frame,
            expression: format!("&{}", name),
        }
    }

    /// `sizeof` expression for a named variable.
    pub fn size_of(thread: u32, frame: u32, name: &str) -> Self {
        MiCommand::Evaluate {
            thread,
            frame,
            expression: format!("sizeof({})", name),
        }
    }
}

/// Split `"12-exec-next"` into `(Some(12), "-exec-next")`.
///
/// Text without a leading digit run is returned unchanged with no token.
pub fn split_token(text: &str) -> (Option<u64>, &str) {
    let trimmed = text.trim();
    let digits = trimmed
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    if digits == 0 {
        return (None, trimmed);
    }

    match trimmed[..digits].parse::<u64>() {
        Ok(token) => (Some(token), &trimmed[digits..]),
        Err(_) => (None, trimmed),
    }
}

/// Blank input is a no-op rather than a command.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
