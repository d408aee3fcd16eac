//! The fixed OSCE marking sheet. Item indices are stable for the lifetime of
//! a scoring run and are used to align scores and comments.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

pub const CHECKLIST_LEN: usize = 35;

/// Built-in marking sheet: history (1-17), examination (18-24),
/// lab & radiology (25-26), management (27-34), interaction (35).
pub const OSCE_CHECKLIST: [&str; CHECKLIST_LEN] = [
    "Greets the patient / introduces self and establishes good rapport",
    "Clarifies details of the chief complaint",
    "Asks about associated symptoms related to the presenting system",
    "Rules out emergency case red flags",
    "Rules out B-symptom red flags",
    "Performs review of systems",
    "Takes obstetric and gynecological history (for female patients)",
    "Asks about past medical history",
    "Asks about past surgical history",
    "Asks about drug and allergy history",
    "Asks about family history",
    "Takes social history",
    "Takes neonatal history (for pediatric patients)",
    "Asks about developmental milestones (for pediatric patients)",
    "Elicits ICEE (Ideas, Concerns, Expectations, and Effects on life)",
    "Screens using PHQ2",
    "Screens for vaccination and preventive health relevant to age and sex",
    "Takes permission, washes hands, maintains privacy",
    "Measures vital signs",
    "Assesses general appearance",
    "Examines the main system involved in the chief complaint",
    "Examines related systems as relevant to the main system",
    "Elicits specific signs to confirm the suspected diagnosis",
    "Performs focused examinations if specific instruments are provided",
    "Orders or explains lab investigations as required",
    "Recognizes and interprets radiological findings appropriately",
    "Clarifies diagnosis and explains management options",
    "Reassures the patient with empathy and honesty",
    "Provides non-pharmacological advice",
    "Prescribes pharmacological treatment",
    "Refers to appropriate services as needed",
    "Orders further investigations as needed",
    "Advises on follow-up/observation",
    "Discusses disease prevention and health promotion",
    "Demonstrates effective communication and empathy",
];

#[derive(Error, Debug)]
pub enum ChecklistError {
    #[error("checklist must contain exactly 35 items, got {0}")]
    WrongLength(usize),
    #[error("checklist item {0} is empty")]
    EmptyItem(usize),
    #[error("failed to read checklist: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse checklist: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable, cheaply clonable list of criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct Checklist {
    items: Arc<[String]>,
}

impl Default for Checklist {
    fn default() -> Self {
        Self {
            items: OSCE_CHECKLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Checklist {
    pub fn new(items: Vec<String>) -> Result<Self, ChecklistError> {
        if items.len() != CHECKLIST_LEN {
            return Err(ChecklistError::WrongLength(items.len()));
        }
        if let Some(idx) = items.iter().position(|s| s.trim().is_empty()) {
            return Err(ChecklistError::EmptyItem(idx));
        }
        Ok(Self {
            items: items.into(),
        })
    }

    /// Load a JSON array of strings.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChecklistError> {
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<String> = serde_json::from_str(&raw)?;
        Self::new(items)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.items.get(idx).map(String::as_str)
    }

    /// Newline separated, as used in the free-text reasoning prompt.
    pub fn as_lines(&self) -> String {
        self.items.join("\n")
    }

    /// JSON array, as used in structured-output prompts.
    pub fn as_json(&self) -> String {
        serde_json::to_string(&*self.items).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_thirty_five_items() {
        let cl = Checklist::default();
        assert_eq!(cl.len(), CHECKLIST_LEN);
        assert_eq!(cl.get(0), Some(OSCE_CHECKLIST[0]));
        assert_eq!(cl.get(34), Some("Demonstrates effective communication and empathy"));
        assert!(cl.get(35).is_none());
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Checklist::new(vec!["only one".into()]).unwrap_err();
        assert!(matches!(err, ChecklistError::WrongLength(1)));
    }

    #[test]
    fn rejects_blank_items() {
        let mut items: Vec<String> = OSCE_CHECKLIST.iter().map(|s| s.to_string()).collect();
        items[7] = "   ".into();
        assert!(matches!(Checklist::new(items), Err(ChecklistError::EmptyItem(7))));
    }

    #[test]
    fn loads_from_json_file() {
        let dir = std::env::temp_dir().join(format!("checklist-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("checklist.json");
        let items: Vec<String> = (1..=CHECKLIST_LEN).map(|i| format!("Item {i}")).collect();
        std::fs::write(&path, serde_json::to_string(&items).unwrap()).unwrap();

        let cl = Checklist::from_json_file(&path).unwrap();
        assert_eq!(cl.get(2), Some("Item 3"));
        assert!(cl.as_json().starts_with("[\"Item 1\",\"Item 2\""));
        assert_eq!(cl.as_lines().lines().count(), CHECKLIST_LEN);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
