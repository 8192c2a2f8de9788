use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle action applied to a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Start the server
    Start,
    /// Restart the server
    Restart,
    /// Update the server
    Update,
}

impl Action {
    /// Every action, in declaration order
    pub const ALL: [Action; 3] = [Action::Start, Action::Restart, Action::Update];

    /// Extension of the sibling executable that performs this action
    pub fn suffix(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Restart => "restart",
            Action::Update => "update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Action::ALL
            .into_iter()
            .find(|action| action.suffix().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!("start".parse::<Action>().unwrap(), Action::Start);
        assert_eq!(" Restart ".parse::<Action>().unwrap(), Action::Restart);
        assert_eq!("UPDATE".parse::<Action>().unwrap(), Action::Update);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = "delete".parse::<Action>().unwrap_err();
        assert!(matches!(err, Error::InvalidAction(ref name) if name == "delete"));
    }

    #[test]
    fn test_display_matches_suffix() {
        for action in Action::ALL {
            assert_eq!(action.to_string(), action.suffix());
        }
    }
}
