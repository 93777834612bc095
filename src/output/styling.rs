use console::style;

/// Styling helpers for terminal output
pub fn blue(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).blue()
}

pub fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn yellow(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).yellow()
}

pub fn cyan(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn magenta(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
