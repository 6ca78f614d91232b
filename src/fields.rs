//! Specification fields: find a control by its label, classify it, fill it.
//!
//! Fields carry no stable identifiers, so a field is reached through the
//! innermost element showing its label, then the form group around that
//! element. Anything short of a dead session is reported as
//! `SpecificationUnfillable` so the workflow can move on to the next field.

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{ErrorKind, WorkflowError};
use crate::interact::Interactor;
use crate::locator::normalize_label;
use crate::resolver::Constraint;
use crate::session::{ElementScope, Session};
use crate::targets::StrategyTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceKind {
    /// `<select>`, filled with select-by-label
    Native,
    /// Script-driven dropdown: open, then click the option
    Custom,
}

/// What kind of control sits next to a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Choice(ChoiceKind),
    FreeText,
    Unclassifiable,
}

/// Outcome of matching candidate label texts against a wanted label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPick {
    Unique(usize),
    Ambiguous(usize),
    NoMatch,
}

/// Exact normalized matches win; otherwise a lone partial match is accepted.
/// Two or more candidates in the winning tier is ambiguous.
pub fn pick_label<T: AsRef<str>>(candidates: &[T], label: &str) -> LabelPick {
    let wanted = normalize_label(label);
    let normalized: Vec<String> = candidates
        .iter()
        .map(|c| normalize_label(c.as_ref()))
        .collect();

    let exact: Vec<usize> = (0..normalized.len())
        .filter(|&i| normalized[i] == wanted)
        .collect();
    let tier: Vec<usize> = if exact.is_empty() {
        (0..normalized.len())
            .filter(|&i| normalized[i].contains(&wanted))
            .collect()
    } else {
        exact
    };

    match tier.as_slice() {
        [] => LabelPick::NoMatch,
        [only] => LabelPick::Unique(*only),
        many => LabelPick::Ambiguous(many.len()),
    }
}

/// Fills one label/value pair at a time
pub struct FieldFiller<'a> {
    table: &'a StrategyTable,
    interactor: &'a Interactor,
}

impl<'a> FieldFiller<'a> {
    pub fn new(table: &'a StrategyTable, interactor: &'a Interactor) -> Self {
        Self { table, interactor }
    }

    /// Fill the field labelled `label` with `value`.
    ///
    /// Errors are either `SessionFatal` (abort the attempt) or
    /// `SpecificationUnfillable` carrying the underlying kind in its detail.
    pub async fn fill<S: Session>(
        &self,
        session: &S,
        label: &str,
        value: &str,
    ) -> Result<FieldKind, WorkflowError> {
        match self.try_fill(session, label, value).await {
            Ok(kind) => {
                info!("Filled '{}' = '{}' ({:?})", label, value, kind);
                Ok(kind)
            }
            Err(e) if e.kind == ErrorKind::SessionFatal => Err(e),
            Err(e) if e.kind == ErrorKind::SpecificationUnfillable => Err(e),
            Err(e) => Err(WorkflowError::new(
                ErrorKind::SpecificationUnfillable,
                format!("'{}': {}", label, e),
            )),
        }
    }

    async fn try_fill<S: Session>(
        &self,
        session: &S,
        label: &str,
        value: &str,
    ) -> Result<FieldKind, WorkflowError> {
        let resolver = self.interactor.resolver();
        let candidates = resolver
            .resolve_all(
                session,
                &self.table.field_label(label),
                ElementScope::Page,
                Constraint::Interactable,
            )
            .await?;

        let mut texts = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let text = candidate
                .text()
                .await
                .map_err(|e| e.into_workflow(ErrorKind::SpecificationUnfillable))?;
            let text = if text.trim().is_empty() {
                candidate
                    .attr("placeholder")
                    .await
                    .map_err(|e| e.into_workflow(ErrorKind::SpecificationUnfillable))?
                    .unwrap_or_default()
            } else {
                text
            };
            texts.push(text);
        }

        let label_el = match pick_label(&texts, label) {
            LabelPick::Unique(i) => &candidates[i],
            LabelPick::Ambiguous(n) => {
                return Err(WorkflowError::new(
                    ErrorKind::SpecificationUnfillable,
                    format!("'{}' matches {} labels equally well", label, n),
                ));
            }
            LabelPick::NoMatch => {
                return Err(WorkflowError::new(
                    ErrorKind::SpecificationUnfillable,
                    format!("no label text matches '{}'", label),
                ));
            }
        };
        debug!("Label '{}' resolved to {:?}", label, label_el);

        let container = resolver
            .resolve(
                session,
                &self.table.field_container(),
                label_el.scope(),
                Constraint::Present,
            )
            .await?;
        let scope = container.scope();

        let kind = self.classify(session, scope).await?;
        match kind {
            FieldKind::Choice(ChoiceKind::Native) => {
                self.interactor
                    .safe_select(session, &self.table.native_choice(), scope, value)
                    .await?;
            }
            FieldKind::Choice(ChoiceKind::Custom) => {
                self.interactor
                    .safe_click(session, &self.table.custom_choice(), scope)
                    .await?;
                // Open option lists are usually portalled outside the form
                self.interactor
                    .safe_click(session, &self.table.choice_option(value), ElementScope::Page)
                    .await?;
            }
            FieldKind::FreeText => {
                self.interactor
                    .safe_input(session, &self.table.text_input(), scope, value)
                    .await?;
            }
            FieldKind::Unclassifiable => {
                return Err(WorkflowError::new(
                    ErrorKind::SpecificationUnfillable,
                    format!("nothing fillable next to label '{}'", label),
                ));
            }
        }
        Ok(kind)
    }

    /// Probe a field container for a native select, a dropdown trigger, then a text input
    pub async fn classify<S: Session>(
        &self,
        session: &S,
        container: ElementScope<'_, S::Handle>,
    ) -> Result<FieldKind, WorkflowError> {
        let probes = [
            (self.table.native_choice(), FieldKind::Choice(ChoiceKind::Native)),
            (self.table.custom_choice(), FieldKind::Choice(ChoiceKind::Custom)),
            (self.table.text_input(), FieldKind::FreeText),
        ];

        for (list, kind) in probes {
            match self
                .interactor
                .resolver()
                .resolve(session, &list, container, Constraint::Interactable)
                .await
            {
                Ok(_) => return Ok(kind),
                Err(e) if e.kind == ErrorKind::LocatorNotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(FieldKind::Unclassifiable)
    }
}

#[cfg(test)]
#[path = "fields_test.rs"]
mod fields_test;
