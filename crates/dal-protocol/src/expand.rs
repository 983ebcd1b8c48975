//! Turn each matching catalog row into its output records.

use tracing::{debug, warn};

use dal_common::{DalError, DalResult};

use crate::params::ParamSet;
use crate::protocol::Protocol;
use crate::records::{CatalogRow, OutputRecord, ProductKind};
use crate::synthesis::MetadataSynthesizer;
use crate::table::TableConfiguration;
use crate::variants::{variants_for, FormatSelection, FormatVariant, ModeSelection};
use crate::virtual_image::{EditOutcome, VirtualImageEditor};

/// Collects output records up to a fixed cap.
#[derive(Debug, Clone)]
pub struct RecordSink {
    records: Vec<OutputRecord>,
    cap: usize,
}

impl RecordSink {
    pub fn new(cap: usize) -> Self {
        Self {
            records: Vec::new(),
            cap,
        }
    }

    /// Add a record. Fails with `Overflow` once the cap is reached; records
    /// already collected are kept.
    pub fn push(&mut self, record: OutputRecord) -> DalResult<()> {
        self.ensure_room()?;
        self.records.push(record);
        Ok(())
    }

    /// Fails with `Overflow` when no further record fits.
    pub fn ensure_room(&self) -> DalResult<()> {
        if self.records.len() >= self.cap {
            Err(DalError::Overflow(self.cap))
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<OutputRecord> {
        self.records
    }
}

/// Per-row expansion counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expansion {
    pub emitted: usize,
    pub discarded: usize,
}

/// Decides which variants each row yields and builds their records.
pub struct RecordExpander<'a> {
    protocol: Protocol,
    table: &'a dyn TableConfiguration,
    formats: FormatSelection,
    modes: ModeSelection,
    next_association: usize,
    warned_no_editor: bool,
}

impl<'a> RecordExpander<'a> {
    pub fn new(protocol: Protocol, table: &'a dyn TableConfiguration, params: &ParamSet) -> Self {
        Self {
            protocol,
            table,
            formats: FormatSelection::from_param(params.text("FORMAT")),
            modes: ModeSelection::from_param(params.text("MODE")),
            next_association: 0,
            warned_no_editor: false,
        }
    }

    /// Variants a row yields, from its stored format.
    pub fn variants(&self, row: &CatalogRow) -> Vec<FormatVariant> {
        let stored = row
            .text(self.table.column("access_format"))
            .unwrap_or_default();
        variants_for(self.protocol, self.formats, self.modes, &stored)
    }

    /// Association id for a row yielding `count` variants. Ids are only
    /// assigned when there is more than one variant to associate.
    pub fn associate(&mut self, count: usize) -> Option<String> {
        if count < 2 {
            return None;
        }
        self.next_association += 1;
        Some(format!("MultiFormat.{}", self.next_association))
    }

    /// Emit the records of one row into the sink.
    pub fn expand(
        &mut self,
        row: &CatalogRow,
        synthesizer: &MetadataSynthesizer<'_>,
        editor: Option<&VirtualImageEditor<'_>>,
        sink: &mut RecordSink,
    ) -> DalResult<Expansion> {
        let variants = self.variants(row);
        let assoc_id = self.associate(variants.len());
        let mut expansion = Expansion::default();

        for variant in &variants {
            // Stop before synthesis so a full sink never runs a cutout.
            sink.ensure_room()?;
            let synthesized = synthesizer.synthesize(row, variant)?;
            let mut record = synthesized.record;
            record.assoc_id = assoc_id.clone();
            if let Some(id) = &assoc_id {
                if synthesizer.directory().contains("assoc_id") {
                    record.set("assoc_id", id.as_str());
                }
            }

            if variant.product == ProductKind::Virtual {
                let outcome = match (editor, synthesized.publisher_did.as_deref()) {
                    (Some(editor), Some(did)) => {
                        editor.edit(&mut record, did, synthesizer.directory())?
                    }
                    _ => {
                        if !self.warned_no_editor {
                            warn!("Virtual records requested but no cutout task is configured");
                            self.warned_no_editor = true;
                        }
                        EditOutcome::Discarded("no cutout task configured".to_string())
                    }
                };
                if let EditOutcome::Discarded(reason) = outcome {
                    debug!(reason = %reason, "Virtual record discarded");
                    expansion.discarded += 1;
                    continue;
                }
            }

            sink.push(record)?;
            expansion.emitted += 1;
        }

        Ok(expansion)
    }
}
