//! Proposed change payloads
//!
//! The untrusted input contract with the change proposer. Paths are plain
//! strings here; nothing touches the filesystem until the guard has
//! validated them against a session root.

use serde::{Deserialize, Serialize};

/// Kind of edit being proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    /// New file
    Create,
    /// Replace an existing file's content
    Modify,
    /// Remove a file
    Delete,
}

/// One untrusted file edit
///
/// `old_content` is informational only - it reflects what the proposer
/// believed the file contained and is never trusted for conflict
/// detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedChange {
    /// Relative path of the target, unvalidated
    pub path: String,
    /// Edit kind
    pub operation: ChangeOp,
    /// Full replacement content for Create/Modify
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    /// Proposer's view of the prior content; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
}

impl ProposedChange {
    /// Propose creating a file
    #[must_use]
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: ChangeOp::Create,
            new_content: Some(content.into()),
            old_content: None,
        }
    }

    /// Propose replacing a file's content
    #[must_use]
    pub fn modify(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: ChangeOp::Modify,
            new_content: Some(content.into()),
            old_content: None,
        }
    }

    /// Propose deleting a file
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: ChangeOp::Delete,
            new_content: None,
            old_content: None,
        }
    }

    /// Attach the proposer's view of the prior content
    #[must_use]
    pub fn with_old_content(mut self, content: impl Into<String>) -> Self {
        self.old_content = Some(content.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_operation() {
        assert_eq!(
            ProposedChange::create("a.ts", "x").operation,
            ChangeOp::Create
        );
        assert_eq!(
            ProposedChange::modify("a.ts", "x").operation,
            ChangeOp::Modify
        );
        assert_eq!(ProposedChange::delete("a.ts").operation, ChangeOp::Delete);
        assert!(ProposedChange::delete("a.ts").new_content.is_none());
    }

    #[test]
    fn serde_uses_camel_case_and_omits_absent_content() {
        let change = ProposedChange::modify("src/a.ts", "new").with_old_content("old");
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["operation"], "modify");
        assert_eq!(json["newContent"], "new");
        assert_eq!(json["oldContent"], "old");

        let json = serde_json::to_value(ProposedChange::delete("a.ts")).unwrap();
        assert!(json.get("newContent").is_none());
    }
}
