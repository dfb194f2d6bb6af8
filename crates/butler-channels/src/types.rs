use serde::{Deserialize, Serialize};

/// A labelled button carrying an opaque callback payload.
///
/// The callback string comes back verbatim when the user taps the button;
/// the gateway parses it (e.g. `confirm:42`, `snooze:17:10`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub callback: String,
}

impl Button {
    pub fn new(label: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback: callback.into(),
        }
    }
}

/// Up to two rows of buttons attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    pub rows: Vec<Vec<Button>>,
}

impl Controls {
    /// One row of buttons.
    pub fn row(buttons: Vec<Button>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }

    /// Two rows of buttons.
    pub fn two_rows(top: Vec<Button>, bottom: Vec<Button>) -> Self {
        Self {
            rows: vec![top, bottom],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }
}
