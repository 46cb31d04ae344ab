// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-operation state threaded through all lifecycle calls.
use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::search::SearchUpdate;

/// User on whose behalf documents are changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user: String,
    pub roles: BTreeSet<String>,
}

impl Actor {
    pub fn new<'a>(user: &str, roles: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            user: user.to_owned(),
            roles: roles.into_iter().map(str::to_owned).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Switches relaxing the checks of one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub ignore_permissions: bool,
    pub ignore_links: bool,
    pub ignore_validate: bool,
    pub ignore_mandatory: bool,
    pub ignore_version: bool,
}

/// Context of one caller.
///
/// Next to identity and flags it keeps the documents currently being saved and the side effects
/// which wait for their transaction to commit.
#[derive(Debug)]
pub struct Context {
    pub actor: Actor,
    pub flags: Flags,
    in_flight: HashSet<(String, String)>,
    pending: Vec<Event>,
    pending_search: Vec<SearchUpdate>,
}

/// Position in the queues of pending side effects.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PendingMark {
    events: usize,
    search: usize,
}

impl Context {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            flags: Flags::default(),
            in_flight: HashSet::new(),
            pending: Vec::new(),
            pending_search: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn ignore_permissions(mut self) -> Self {
        self.flags.ignore_permissions = true;
        self
    }

    /// Returns `true` while the document is being inserted or saved within this context.
    pub fn is_in_flight(&self, doctype: &str, name: &str) -> bool {
        self.in_flight
            .contains(&(doctype.to_owned(), name.to_owned()))
    }

    /// Register a document as being saved, returns `false` if it already was.
    pub(crate) fn enter(&mut self, doctype: &str, name: &str) -> bool {
        self.in_flight.insert((doctype.to_owned(), name.to_owned()))
    }

    pub(crate) fn leave(&mut self, doctype: &str, name: &str) {
        self.in_flight.remove(&(doctype.to_owned(), name.to_owned()));
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        if !self.pending.contains(&event) {
            self.pending.push(event);
        }
    }

    pub(crate) fn push_search(&mut self, update: SearchUpdate) {
        self.pending_search.push(update);
    }

    pub(crate) fn mark(&self) -> PendingMark {
        PendingMark {
            events: self.pending.len(),
            search: self.pending_search.len(),
        }
    }

    /// Drop side effects queued after `mark`, their transaction was rolled back.
    pub(crate) fn discard_since(&mut self, mark: PendingMark) {
        self.pending.truncate(mark.events);
        self.pending_search.truncate(mark.search);
    }

    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn take_search_updates(&mut self) -> Vec<SearchUpdate> {
        std::mem::take(&mut self.pending_search)
    }
}
