// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::DocStatus;

/// State of a workflow and the docstatus a document has while being in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub state: String,
    pub doc_status: DocStatus,
}

/// Allowed move between two workflow states.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub state: String,
    pub action: String,
    pub next_state: String,
    pub allowed: String,
}

/// Workflow attached to a doctype.
///
/// The current state of a document is kept in `state_field`. Only the trigger points of a
/// workflow are evaluated by the lifecycle, there is no separate workflow engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub name: String,
    pub state_field: String,
    pub states: Vec<WorkflowState>,
    pub transitions: Vec<WorkflowTransition>,
}

impl WorkflowDef {
    pub fn new(name: &str, state_field: &str) -> Self {
        Self {
            name: name.to_owned(),
            state_field: state_field.to_owned(),
            states: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: &str, doc_status: DocStatus) -> Self {
        self.states.push(WorkflowState {
            state: state.to_owned(),
            doc_status,
        });
        self
    }

    pub fn with_transition(
        mut self,
        state: &str,
        action: &str,
        next_state: &str,
        allowed: &str,
    ) -> Self {
        self.transitions.push(WorkflowTransition {
            state: state.to_owned(),
            action: action.to_owned(),
            next_state: next_state.to_owned(),
            allowed: allowed.to_owned(),
        });
        self
    }

    /// Initial state for new documents.
    pub fn first_state(&self) -> Option<&WorkflowState> {
        self.states.first()
    }

    pub fn get_state(&self, state: &str) -> Option<&WorkflowState> {
        self.states.iter().find(|candidate| candidate.state == state)
    }

    /// First state in which documents have the given docstatus.
    pub fn first_state_with(&self, doc_status: DocStatus) -> Option<&WorkflowState> {
        self.states
            .iter()
            .find(|candidate| candidate.doc_status == doc_status)
    }

    /// Transitions leading from `from` to `to`.
    pub fn transitions_between<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
    ) -> impl Iterator<Item = &'a WorkflowTransition> + 'a {
        self.transitions
            .iter()
            .filter(move |transition| transition.state == from && transition.next_state == to)
    }
}

#[cfg(test)]
mod tests {
    use crate::DocStatus;

    use super::WorkflowDef;

    #[test]
    fn lookup_states_and_transitions() {
        let workflow = WorkflowDef::new("Order Approval", "workflow_state")
            .with_state("Pending", DocStatus::Draft)
            .with_state("Approved", DocStatus::Submitted)
            .with_state("Rejected", DocStatus::Cancelled)
            .with_transition("Pending", "Approve", "Approved", "Sales Manager")
            .with_transition("Approved", "Reject", "Rejected", "Sales Manager");

        assert_eq!(workflow.first_state().unwrap().state, "Pending");
        assert_eq!(
            workflow.first_state_with(DocStatus::Cancelled).unwrap().state,
            "Rejected"
        );
        assert_eq!(workflow.transitions_between("Pending", "Approved").count(), 1);
        assert_eq!(workflow.transitions_between("Pending", "Rejected").count(), 0);
        assert!(workflow.get_state("Unknown").is_none());
    }
}
