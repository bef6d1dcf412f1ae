//! Updating an existing patch to match a revised selection.
//!
//! Sections for untouched files are copied byte-for-byte in their original
//! order; refreshed files are regenerated in place; new files go at the end
//! in the order they were added. With no refresh marks and no additions the
//! output equals the input, so reconciling twice changes nothing.

use crate::assemble::{DiffError, PatchAssembler};
use crate::document::PatchDocument;
use crate::selection::SelectionSet;
use crate::source::DiffSource;

/// Rebuilds a patch from its previous version and a [`SelectionSet`].
pub struct PatchReconciler<'a, S: DiffSource> {
    assembler: PatchAssembler<'a, S>,
}

impl<'a, S: DiffSource> PatchReconciler<'a, S> {
    pub fn new(assembler: PatchAssembler<'a, S>) -> Self {
        Self { assembler }
    }

    /// Produce the updated patch.
    ///
    /// Nothing is written here; on error the caller still holds the original
    /// untouched. A refreshed or added path that no longer exists on disk is
    /// left out with a warning.
    pub fn reconcile(
        &self,
        original: &PatchDocument,
        selection: &SelectionSet,
    ) -> Result<PatchDocument, DiffError> {
        let mut output = PatchDocument::with_preamble(original.preamble());

        for section in original.sections() {
            let path = section.path.as_str();
            if !selection.includes(path) {
                log::debug!("Dropping {path}");
            } else if selection.is_refresh(path) {
                log::debug!("Refreshing {path}");
                if let Some(fresh) = self.assembler.section_for(path)? {
                    output.insert(fresh);
                }
            } else {
                output.insert(section.clone());
            }
        }

        for path in selection.included() {
            if original.contains(path) {
                continue;
            }
            log::debug!("Adding {path}");
            if let Some(fresh) = self.assembler.section_for(path)? {
                output.insert(fresh);
            }
        }

        Ok(output)
    }
}
