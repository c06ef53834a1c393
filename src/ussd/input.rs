//! Cumulative input decoding.
//!
//! The gateway resends the whole history on every turn (`1*Ahmed*2`), so
//! everything here is a pure function of that string. [`decode`] splits it;
//! [`resolve_stage`] replays all but the final token through the menu
//! transitions to find which screen the final token answers.

use crate::registration::model::RegistrationType;

/// Separator between tokens in the cumulative input.
pub const DELIMITER: char = '*';

/// Minimum trimmed length for names and free-text school entries.
pub const MIN_NAME_LEN: usize = 3;

/// Result of splitting the cumulative input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInput {
    /// Token count; 0 for the initial (empty) request.
    pub step: usize,
    /// Final token, the value entered this turn.
    pub last: String,
    pub tokens: Vec<String>,
}

impl DecodedInput {
    /// Whether this is the first contact of a dialog.
    pub fn is_initial(&self) -> bool {
        self.step == 0
    }
}

/// Split cumulative input on `*`.
pub fn decode(text: &str) -> DecodedInput {
    if text.is_empty() {
        return DecodedInput {
            step: 0,
            last: String::new(),
            tokens: Vec::new(),
        };
    }

    let tokens: Vec<String> = text.split(DELIMITER).map(str::to_string).collect();
    DecodedInput {
        step: tokens.len(),
        last: tokens.last().cloned().unwrap_or_default(),
        tokens,
    }
}

// ── Choices ─────────────────────────────────────────────────────────

/// Main menu options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Register(RegistrationType),
    EventInformation,
    Contact,
    Exit,
}

impl MenuChoice {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Self::Register(RegistrationType::Student)),
            "2" => Some(Self::Register(RegistrationType::Teacher)),
            "3" => Some(Self::EventInformation),
            "4" => Some(Self::Contact),
            "0" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// School selection options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolChoice {
    /// `0`: type the school name instead.
    Custom,
    /// Zero-based catalog index.
    Catalog(usize),
}

impl SchoolChoice {
    /// `0` is always the custom option; `n` in `1..=catalog_size` picks entry
    /// `n - 1`. Anything else, including non-numeric tokens, is `None`.
    pub fn parse(token: &str, catalog_size: usize) -> Option<Self> {
        if token == "0" {
            return Some(Self::Custom);
        }
        match token.parse::<usize>() {
            Ok(n) if (1..=catalog_size).contains(&n) => Some(Self::Catalog(n - 1)),
            _ => None,
        }
    }
}

/// Summary screen options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryChoice {
    Confirm,
    Edit,
    Cancel,
}

impl SummaryChoice {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Self::Confirm),
            "2" => Some(Self::Edit),
            "0" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Trimmed free text if it is long enough to be a name.
pub fn parse_name(token: &str) -> Option<&str> {
    let trimmed = token.trim();
    (trimmed.chars().count() >= MIN_NAME_LEN).then_some(trimmed)
}

// ── Stage replay ────────────────────────────────────────────────────

/// The screen a token is answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MainMenu,
    NameEntry(RegistrationType),
    SchoolSelection,
    CustomSchoolEntry,
    Summary,
    /// A terminal choice was already made; no further input is expected.
    Closed,
}

impl Stage {
    /// The stage that follows once `token` has been answered on this one.
    ///
    /// Invalid tokens keep the current stage, matching the re-prompt the
    /// user saw for them.
    pub fn after(self, token: &str, catalog_size: usize) -> Stage {
        match self {
            Stage::MainMenu => match MenuChoice::parse(token) {
                Some(MenuChoice::Register(kind)) => Stage::NameEntry(kind),
                Some(_) => Stage::Closed,
                None => Stage::MainMenu,
            },
            Stage::NameEntry(kind) => match parse_name(token) {
                Some(_) => Stage::SchoolSelection,
                None => Stage::NameEntry(kind),
            },
            Stage::SchoolSelection => match SchoolChoice::parse(token, catalog_size) {
                Some(SchoolChoice::Custom) => Stage::CustomSchoolEntry,
                Some(SchoolChoice::Catalog(_)) => Stage::Summary,
                None => Stage::SchoolSelection,
            },
            Stage::CustomSchoolEntry => match parse_name(token) {
                Some(_) => Stage::Summary,
                None => Stage::CustomSchoolEntry,
            },
            Stage::Summary => match SummaryChoice::parse(token) {
                Some(SummaryChoice::Edit) => Stage::MainMenu,
                Some(_) => Stage::Closed,
                None => Stage::Summary,
            },
            Stage::Closed => Stage::Closed,
        }
    }
}

/// Replay every token except the last and return the stage the last token
/// answers.
pub fn resolve_stage(tokens: &[String], catalog_size: usize) -> Stage {
    let answered = tokens.len().saturating_sub(1);
    tokens[..answered]
        .iter()
        .fold(Stage::MainMenu, |stage, token| stage.after(token, catalog_size))
}
