#![forbid(unsafe_code)]

//! Presentational components.

use std::fmt;

/// Result of pressing a [`Button`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    /// The press was accepted.
    Accepted,
    /// The button is disabled; nothing happened.
    Ignored,
}

/// A labelled push button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    title: String,
    disabled: bool,
    presses: u32,
}

impl Button {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            disabled: false,
            presses: 0,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Accepted presses so far.
    #[must_use]
    pub fn presses(&self) -> u32 {
        self.presses
    }

    /// Register a press. Disabled buttons ignore it.
    pub fn press(&mut self) -> Press {
        if self.disabled {
            return Press::Ignored;
        }
        self.presses += 1;
        Press::Accepted
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ {} ]", self.title)?;
        if self.disabled {
            write!(f, " (disabled)")?;
        }
        Ok(())
    }
}
