use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = crate::AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "manage" => Ok(Action::Manage),
            other => Err(crate::AuthzError::InvalidAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Action;
    use crate::AuthzError;

    #[test]
    fn action_string_roundtrip() {
        for action in Action::ALL {
            let as_str = action.as_str();
            assert_eq!(as_str.parse::<Action>().ok(), Some(action));
            assert_eq!(action.to_string(), as_str);
        }
    }

    #[test]
    fn action_from_str_rejects_unknown_and_case_variants() {
        assert!(matches!(
            "write".parse::<Action>(),
            Err(AuthzError::InvalidAction(_))
        ));
        assert!("READ".parse::<Action>().is_err());
    }

    #[test]
    fn action_serializes_lowercase() {
        let json = serde_json::to_string(&Action::Manage).expect("serialize");
        assert_eq!(json, "\"manage\"");
    }
}
