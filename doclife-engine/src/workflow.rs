// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow trigger points evaluated while a document is saved.
use doclife_core::{DocTypeMeta, Document};
use tracing::debug;

use crate::config::Config;
use crate::context::Actor;
use crate::error::DocumentError;
use crate::permissions::is_administrator;

/// Initialise, move and check the workflow state of a document.
///
/// A document without state starts in the first state. When the state does not fit the
/// docstatus anymore (after submit or cancel), it moves to the first state which does. Every
/// change of state needs a transition the actor holds the role for, and the new state needs to
/// match the docstatus of the document.
pub(crate) fn validate_workflow(
    config: &Config,
    actor: &Actor,
    meta: &DocTypeMeta,
    doc: &mut Document,
    before: Option<&Document>,
) -> Result<(), DocumentError> {
    let Some(workflow) = &meta.workflow else {
        return Ok(());
    };
    let field = workflow.state_field.as_str();

    let mut current = doc.get_str(field).unwrap_or_default().trim().to_owned();
    if current.is_empty()
        && let Some(first) = workflow.first_state()
    {
        current = first.state.clone();
    }

    let fits = workflow
        .get_state(&current)
        .is_some_and(|state| state.doc_status == doc.docstatus);
    if !fits && let Some(state) = workflow.first_state_with(doc.docstatus) {
        current = state.state.clone();
    }
    doc.set(field, current.as_str());

    let Some(state) = workflow.get_state(&current) else {
        return Err(DocumentError::Validation(format!(
            "'{current}' is not a state of workflow {}",
            workflow.name
        )));
    };

    let previous = before
        .and_then(|before| before.get_str(field))
        .filter(|previous| !previous.is_empty());
    let Some(previous) = previous else {
        return Ok(());
    };
    if previous == current {
        return Ok(());
    }

    let transition_error = || DocumentError::WorkflowTransition {
        doctype: doc.doctype.clone(),
        from: previous.to_owned(),
        to: current.clone(),
    };
    let allowed = workflow
        .transitions_between(previous, &current)
        .any(|transition| is_administrator(config, actor) || actor.has_role(&transition.allowed));
    if !allowed || state.doc_status != doc.docstatus {
        debug!(
            doctype = %doc.doctype,
            from = previous,
            to = %current,
            user = %actor.user,
            "workflow transition refused"
        );
        return Err(transition_error());
    }
    Ok(())
}
