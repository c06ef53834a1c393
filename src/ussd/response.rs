//! Dialog responses and their gateway wire form.

use serde::{Deserialize, Serialize};

/// Marker for a response that keeps the dialog open.
pub const CONTINUE_MARKER: &str = "CON ";
/// Marker for a response that ends the dialog.
pub const END_MARKER: &str = "END ";

/// Outcome of one dialog turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UssdResponse {
    /// Show the text and wait for more input.
    Continue(String),
    /// Show the text and end the dialog. The session is already gone.
    Terminate(String),
}

impl UssdResponse {
    pub fn text(&self) -> &str {
        match self {
            Self::Continue(text) | Self::Terminate(text) => text,
        }
    }

    pub fn continues(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminate(_))
    }

    /// Marker-prefixed text as gateways expect it (`CON ...` / `END ...`).
    pub fn to_wire(&self) -> String {
        match self {
            Self::Continue(text) => format!("{CONTINUE_MARKER}{text}"),
            Self::Terminate(text) => format!("{END_MARKER}{text}"),
        }
    }
}

/// Structured response body for gateways that take JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    pub response: String,
    pub continue_session: bool,
}

impl From<&UssdResponse> for WireResponse {
    fn from(response: &UssdResponse) -> Self {
        Self {
            response: response.to_wire(),
            continue_session: response.continues(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_prefixes() {
        assert_eq!(UssdResponse::Continue("Menu".into()).to_wire(), "CON Menu");
        assert_eq!(UssdResponse::Terminate("Bye".into()).to_wire(), "END Bye");
    }

    #[test]
    fn structured_body_mirrors_continuation() {
        let body = WireResponse::from(&UssdResponse::Terminate("Bye".into()));
        assert_eq!(body.response, "END Bye");
        assert!(!body.continue_session);

        let json = serde_json::to_value(WireResponse::from(&UssdResponse::Continue("x".into())))
            .unwrap();
        assert_eq!(json["continue_session"], true);
        assert_eq!(json["response"], "CON x");
    }
}
