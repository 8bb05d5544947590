use serde::{Deserialize, Serialize};

use super::turn::{Author, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl From<Author> for Role {
    fn from(author: Author) -> Self {
        match author {
            Author::User => Role::User,
            Author::Assistant => Role::Model,
        }
    }
}

/// One entry of the multi-turn request history: `{"role": ..., "parts": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHistoryEntry {
    pub role: Role,
    pub parts: Vec<String>,
}

impl RequestHistoryEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![text.into()],
        }
    }
}

/// Maps turns one-to-one onto request history entries, in order.
///
/// Only the text component of a payload is carried over. Image bytes are
/// never folded into the multi-turn history, so a `TextWithImage` turn
/// contributes just its text.
pub fn project_history(turns: &[Turn]) -> Vec<RequestHistoryEntry> {
    turns
        .iter()
        .map(|turn| RequestHistoryEntry::new(Role::from(turn.author), turn.text()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{project_history, RequestHistoryEntry, Role};
    use crate::turns::{ImageAttachment, Turn};

    fn mixed_turns() -> Vec<Turn> {
        vec![
            Turn::user_text("What is velocity?"),
            Turn::assistant_text("Rate of change of displacement."),
            Turn::user_with_image(
                "Explain this circuit",
                ImageAttachment::new("image/png", vec![137, 80, 78, 71]),
            ),
            Turn::assistant_text("Start with the cell."),
        ]
    }

    #[test]
    fn empty_store_projects_to_empty_history() {
        assert!(project_history(&[]).is_empty());
    }

    #[test]
    fn roles_map_element_wise_in_order() {
        let turns = mixed_turns();
        let history = project_history(&turns);
        assert_eq!(history.len(), turns.len());
        let roles = history.iter().map(|entry| entry.role).collect::<Vec<Role>>();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User, Role::Model]);
        for (entry, turn) in history.iter().zip(turns.iter()) {
            assert_eq!(entry.parts, vec![turn.text().to_string()]);
        }
    }

    #[test]
    fn image_turn_keeps_only_its_text() {
        let history = project_history(&mixed_turns());
        assert_eq!(
            history[2],
            RequestHistoryEntry::new(Role::User, "Explain this circuit")
        );
    }

    #[test]
    fn projection_is_pure() {
        let turns = mixed_turns();
        assert_eq!(project_history(&turns), project_history(&turns));
    }

    #[test]
    fn entries_serialize_to_wire_shape() -> anyhow::Result<()> {
        let history = project_history(&mixed_turns()[..2]);
        assert_eq!(
            serde_json::to_value(&history)?,
            json!([
                {"role": "user", "parts": ["What is velocity?"]},
                {"role": "model", "parts": ["Rate of change of displacement."]},
            ])
        );
        Ok(())
    }
}
