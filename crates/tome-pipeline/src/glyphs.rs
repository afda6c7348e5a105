//! Action-cost icon lookup.
//!
//! Styled spans in the source dialect carry single-character action-cost
//! markers; this module maps them to canonical codes and renders them
//! either as backticked `pf2:<code>` short-codes (understood by the
//! action-icons viewer plugin) or as a fixed Unicode glyph set. The same
//! lookup serves the HTML conversion rule and any template that wants to
//! print action costs.

use tome_config::IconStyle;

/// An action cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCost {
    /// Free action.
    Free,
    /// Reaction.
    Reaction,
    /// Single action.
    One,
    /// Two-action activity.
    Two,
    /// Three-action activity.
    Three,
}

impl ActionCost {
    /// Parse the marker character(s) found inside an action-glyph span.
    ///
    /// Source entries are inconsistent: most spells use `1` for a single
    /// action while many feats use `a`; free actions appear as `F` or the
    /// already-canonical `0`.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        Some(match marker.trim() {
            "F" | "f" | "0" => Self::Free,
            "R" | "r" => Self::Reaction,
            "a" | "A" | "1" => Self::One,
            "2" => Self::Two,
            "3" => Self::Three,
            _ => return None,
        })
    }

    /// Canonical short-code for this cost.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Free => "0",
            Self::Reaction => "r",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
        }
    }

    /// Fixed Unicode glyph for this cost.
    #[must_use]
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Free => "◇",
            Self::Reaction => "⟳",
            Self::One => "◆",
            Self::Two => "◆◆",
            Self::Three => "◆◆◆",
        }
    }

    /// Render this cost in the configured style.
    #[must_use]
    pub fn render(self, style: IconStyle) -> String {
        match style {
            IconStyle::Shortcode => format!("`pf2:{}`", self.code()),
            IconStyle::Unicode => self.glyph().to_owned(),
        }
    }
}
