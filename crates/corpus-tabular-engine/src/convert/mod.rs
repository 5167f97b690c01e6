//! # Conversion Pipeline
//!
//! Line-by-line conversion of a tabular corpus into the collaborator model.
//!
//! ## Phases
//!
//! 1. **Line facts** (`classify`): strip line endings, detect blank lines
//! 2. **Classification** (`handler`): the [`BlockHandler`] tree decides, per
//!    line, between block begin/end, attribute, and content
//! 3. **Resolution** (`crate::resolve`): content fields and attribute
//!    payloads become typed annotations or structural effects
//!
//! ## Modules
//!
//! - **`classify`**: [`LineInfo`] local line facts
//! - **`matcher`**: compiled delimiter/attribute tests with partial-match
//!   support
//! - **`handler`**: the recursive block handler state machine
//! - **`context`**: the resolver cursor and its raw-override proxy
//! - **`buffer`**: capped, amortized-growth positional buffers
//!
//! ## Key invariants
//!
//! - Classification order per line: block begin/end before attributes,
//!   attributes before content; unmatched non-blank lines are content where
//!   columns exist
//! - No structure or segment is published before its batch completes
//! - One bad line aborts the whole file; nothing partial is retained

pub mod buffer;
pub mod classify;
pub mod context;
pub mod handler;
pub mod matcher;

pub use classify::LineInfo;
pub use context::{Cursor, RawOverride, ResolverContext};
pub use handler::{BlockHandler, FeedOutcome};
pub use matcher::{AttributeMatcher, MatchOutcome};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, SchemaError};
use crate::model::ConversionTarget;
use crate::schema::TableSchema;

/// Policy for content lines with fewer fields than declared columns.
///
/// Applies only under fixed column order; best-effort mapping tolerates
/// short rows by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortRowPolicy {
    /// Abort the file with a content error.
    #[default]
    Error,
    /// Treat the missing trailing columns as carrying the no-entry label.
    FillNoEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    pub short_rows: ShortRowPolicy,
}

/// Per-layer outcome counts of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConvertReport {
    pub lines: usize,
    pub items: BTreeMap<String, usize>,
    pub containers: BTreeMap<String, usize>,
}

/// Drives one conversion run: feeds physical lines through the handler tree
/// and finalizes all stateful resolvers at end of input.
pub struct TableConverter {
    root: BlockHandler,
    target: ConversionTarget,
    cx: ResolverContext,
    lines_fed: usize,
}

impl TableConverter {
    pub fn new(
        schema: &TableSchema,
        target: ConversionTarget,
        options: ConvertOptions,
    ) -> Result<Self, SchemaError> {
        let root = BlockHandler::build(&schema.root, schema, &target, &options)?;
        tracing::debug!(
            blocks = schema.block_count(),
            group = %schema.group,
            "converter ready"
        );
        Ok(Self {
            root,
            target,
            cx: ResolverContext::new(),
            lines_fed: 0,
        })
    }

    /// Feeds one physical line. Blank lines nothing claims are separators;
    /// anything else unclaimed is a content error.
    pub fn push_line(&mut self, raw: &str) -> Result<(), ConvertError> {
        self.lines_fed += 1;
        let line = LineInfo::classify(raw, self.lines_fed);
        match self.root.feed(&line, &mut self.cx)? {
            FeedOutcome::Consumed => Ok(()),
            FeedOutcome::Rejected if line.is_blank => Ok(()),
            FeedOutcome::Rejected => Err(ConvertError::content(
                line.number,
                line.content,
                "line does not match any block, attribute, or content rule",
            )),
        }
    }

    /// Ends the run: closes open batches, flushes stateful resolvers, and
    /// releases all handler resources.
    pub fn finish(mut self) -> Result<ConvertReport, ConvertError> {
        self.root.finish(self.lines_fed)?;
        self.root.close();
        let report = self.report();
        tracing::debug!(lines = report.lines, "conversion finished");
        Ok(report)
    }

    pub fn convert<'a>(
        mut self,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<ConvertReport, ConvertError> {
        for raw in lines {
            self.push_line(raw)?;
        }
        self.finish()
    }

    pub fn convert_str(self, text: &str) -> Result<ConvertReport, ConvertError> {
        self.convert(text.lines())
    }

    fn report(&self) -> ConvertReport {
        let mut items = BTreeMap::new();
        let mut containers = BTreeMap::new();
        for binding in self.target.layers() {
            let store = binding.store.borrow();
            items.insert(binding.manifest.id.clone(), store.item_count());
            containers.insert(binding.manifest.id.clone(), store.container_count());
        }
        ConvertReport {
            lines: self.lines_fed,
            items,
            containers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnnotationManifest, ContainerId, ItemId, LayerManifest, MemoryCorpus, Value, ValueType,
    };
    use crate::schema::{
        AttributeSchema, AttributeTarget, BlockSchema, ColumnSchema, ResolverId, ResolverSpec,
        Separator,
    };

    fn token_manifest() -> LayerManifest {
        LayerManifest::new("tok")
            .with_annotation(AnnotationManifest::new("form", ValueType::String))
            .with_annotation(AnnotationManifest::new("pos", ValueType::String))
            .with_annotation(AnnotationManifest::new("head", ValueType::Integer))
    }

    fn three_column_block() -> BlockSchema {
        BlockSchema::new("tok")
            .with_end(AttributeSchema::empty_line())
            .with_column(ColumnSchema::new("form", "tok").with_key("form"))
            .with_column(ColumnSchema::new("pos", "tok").with_key("pos"))
            .with_column(ColumnSchema::new("head", "tok").with_key("head"))
    }

    fn convert(
        root: BlockSchema,
        manifests: Vec<LayerManifest>,
        text: &str,
    ) -> (MemoryCorpus, Result<ConvertReport, ConvertError>) {
        let schema = TableSchema::new(Separator::Tab, "main", root).unwrap();
        let corpus = MemoryCorpus::new(manifests);
        let converter =
            TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).unwrap();
        let report = converter.convert_str(text);
        (corpus, report)
    }

    #[test]
    fn two_rows_then_empty_line_close_one_container() {
        let (corpus, report) = convert(
            three_column_block(),
            vec![token_manifest()],
            "The\tDET\t2\ndog\tNOUN\t0\n\n",
        );
        report.unwrap();

        assert_eq!(corpus.container_count("tok"), 1);
        assert_eq!(corpus.item_count("tok"), 2);
        assert_eq!(
            corpus.members("tok", ContainerId(0)),
            vec![ItemId(0), ItemId(1)]
        );
        assert_eq!(
            corpus.annotation("tok", ItemId(0), "form"),
            Some(Value::String("The".into()))
        );
        assert_eq!(
            corpus.annotation("tok", ItemId(1), "head"),
            Some(Value::Integer(0))
        );
    }

    #[test]
    fn empty_line_separates_batches() {
        let (corpus, report) = convert(
            three_column_block(),
            vec![token_manifest()],
            "a\tX\t0\n\nb\tY\t0\nc\tZ\t1\n",
        );
        report.unwrap();

        assert_eq!(corpus.container_count("tok"), 2);
        assert_eq!(corpus.members("tok", ContainerId(0)), vec![ItemId(0)]);
        assert_eq!(
            corpus.members("tok", ContainerId(1)),
            vec![ItemId(1), ItemId(2)]
        );
    }

    #[test]
    fn no_entry_label_suppresses_the_annotation() {
        let (corpus, report) = convert(
            three_column_block(),
            vec![token_manifest()],
            "The\t_\t2\n",
        );
        report.unwrap();
        assert_eq!(corpus.annotation("tok", ItemId(0), "pos"), None);
        assert_eq!(
            corpus.annotation("tok", ItemId(0), "form"),
            Some(Value::String("The".into()))
        );
    }

    #[test]
    fn custom_no_entry_label_override() {
        let root = BlockSchema::new("tok")
            .with_no_entry_label("--")
            .with_column(ColumnSchema::new("form", "tok").with_key("form"));
        let (corpus, report) = convert(root, vec![token_manifest()], "--\nword\n");
        report.unwrap();
        assert_eq!(corpus.annotation("tok", ItemId(0), "form"), None);
        assert_eq!(
            corpus.annotation("tok", ItemId(1), "form"),
            Some(Value::String("word".into()))
        );
    }

    #[test]
    fn excess_fields_without_fallback_abort_the_file() {
        let (_corpus, report) = convert(
            three_column_block(),
            vec![token_manifest()],
            "a\tb\t0\tEXTRA\n",
        );
        let err = report.unwrap_err();
        assert!(err.to_string().contains("no fallback column"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn fallback_column_absorbs_excess_fields() {
        let manifest = token_manifest()
            .with_annotation(AnnotationManifest::new("misc", ValueType::Other));
        let root = three_column_block()
            .with_fallback_column(ColumnSchema::new("misc", "tok").with_key("misc"));
        let (corpus, report) = convert(root, vec![manifest], "a\tX\t0\textra\n");
        report.unwrap();
        assert_eq!(
            corpus.annotation("tok", ItemId(0), "misc"),
            Some(Value::String("extra".into()))
        );
    }

    #[test]
    fn short_rows_error_by_default() {
        let (_corpus, report) =
            convert(three_column_block(), vec![token_manifest()], "a\tX\n");
        let err = report.unwrap_err();
        assert!(err.to_string().contains("expected 3 fields, found 2"));
    }

    #[test]
    fn short_rows_can_fill_with_no_entry() {
        let schema =
            TableSchema::new(Separator::Tab, "main", three_column_block()).unwrap();
        let corpus = MemoryCorpus::new(vec![token_manifest()]);
        let options = ConvertOptions {
            short_rows: ShortRowPolicy::FillNoEntry,
        };
        let converter = TableConverter::new(&schema, corpus.target(), options).unwrap();
        converter.convert_str("a\tX\n").unwrap();

        assert_eq!(
            corpus.annotation("tok", ItemId(0), "form"),
            Some(Value::String("a".into()))
        );
        assert_eq!(corpus.annotation("tok", ItemId(0), "head"), None);
    }

    #[test]
    fn ignored_columns_are_skipped() {
        let root = BlockSchema::new("tok")
            .with_column(ColumnSchema::new("form", "tok").with_key("form"))
            .with_column(ColumnSchema::new("junk", "tok").ignored());
        let (corpus, report) = convert(root, vec![token_manifest()], "a\tJUNK\n");
        report.unwrap();
        assert_eq!(corpus.annotation_count("tok"), 1);
    }

    #[test]
    fn unclassifiable_line_reports_position() {
        // A block with an explicit begin delimiter rejects stray lines.
        let root = BlockSchema::new("tok")
            .with_begin(AttributeSchema::regex("^#start$"))
            .with_column(ColumnSchema::new("form", "tok").with_key("form"));
        let (_corpus, report) = convert(root, vec![token_manifest()], "stray line\n");
        let err = report.unwrap_err();
        assert!(err.to_string().contains("line 1"));
        assert!(err.to_string().contains("stray line"));
    }

    #[test]
    fn begin_line_bounds_batches_when_no_end_is_declared() {
        let doc = BlockSchema::new("doc")
            .with_begin(AttributeSchema::regex("^# newdoc"))
            .with_block(three_column_block());
        let (corpus, report) = convert(
            doc,
            vec![LayerManifest::new("doc"), token_manifest()],
            "# newdoc\na\tX\t0\nb\tY\t1\n\n# newdoc\nc\tZ\t0\n",
        );
        report.unwrap();

        assert_eq!(corpus.container_count("doc"), 2);
        assert_eq!(corpus.container_count("tok"), 2);
        assert_eq!(corpus.item_count("tok"), 3);
        assert_eq!(corpus.members("tok", ContainerId(1)), vec![ItemId(2)]);
    }

    #[test]
    fn metadata_attribute_applies_to_the_next_item() {
        let manifest = LayerManifest::new("tok")
            .with_annotation(AnnotationManifest::new("form", ValueType::String))
            .with_annotation(AnnotationManifest::new("sent_id", ValueType::String));
        let root = BlockSchema::new("tok")
            .with_end(AttributeSchema::empty_line())
            .with_attribute(
                AttributeSchema::regex("^#\\s*(.+)$")
                    .with_target(AttributeTarget::NextItem)
                    .with_resolver(ResolverSpec::new(ResolverId::Metadata)),
            )
            .with_column(ColumnSchema::new("form", "tok").with_key("form"));
        let (corpus, report) = convert(
            root,
            vec![manifest],
            "# sent_id = s1\nHello\nworld\n",
        );
        report.unwrap();

        assert_eq!(
            corpus.annotation("tok", ItemId(0), "sent_id"),
            Some(Value::String("s1".into()))
        );
        assert_eq!(corpus.annotation("tok", ItemId(1), "sent_id"), None);
    }

    #[test]
    fn pending_attribute_is_offered_first_then_others_retried() {
        // EMPTY_LINES partially matches a run of blanks; the comment line
        // afterwards must still reach the regex attribute, and the token
        // line must still become content.
        let manifest = LayerManifest::new("tok")
            .with_annotation(AnnotationManifest::new("form", ValueType::String))
            .allowing_unknown_keys();
        let root = BlockSchema::new("tok")
            .with_attribute(AttributeSchema::empty_lines())
            .with_attribute(
                AttributeSchema::regex("^#\\s*(.+)$")
                    .with_target(AttributeTarget::NextItem)
                    .with_resolver(ResolverSpec::new(ResolverId::Metadata)),
            )
            .with_column(ColumnSchema::new("form", "tok").with_key("form"));
        let (corpus, report) = convert(
            root,
            vec![manifest],
            "one\n\n\n# note = kept\ntwo\n",
        );
        report.unwrap();

        assert_eq!(corpus.item_count("tok"), 2);
        assert_eq!(corpus.container_count("tok"), 1);
        assert_eq!(
            corpus.annotation("tok", ItemId(1), "note"),
            Some(Value::String("kept".into()))
        );
    }

    #[test]
    fn report_counts_lines_items_and_containers() {
        let (_corpus, report) = convert(
            three_column_block(),
            vec![token_manifest()],
            "a\tX\t0\n\nb\tY\t0\n",
        );
        let report = report.unwrap();
        assert_eq!(report.lines, 3);
        assert_eq!(report.items.get("tok"), Some(&2));
        assert_eq!(report.containers.get("tok"), Some(&2));
    }

    #[test]
    fn previous_item_attribute_without_item_is_a_content_error() {
        let manifest = LayerManifest::new("tok")
            .with_annotation(AnnotationManifest::new("form", ValueType::String))
            .allowing_unknown_keys();
        let root = BlockSchema::new("tok")
            .with_attribute(
                AttributeSchema::regex("^#\\s*(.+)$")
                    .with_target(AttributeTarget::PreviousItem)
                    .with_resolver(ResolverSpec::new(ResolverId::Metadata)),
            )
            .with_column(ColumnSchema::new("form", "tok").with_key("form"));
        let (_corpus, report) = convert(root, vec![manifest], "# too = early\n");
        let err = report.unwrap_err();
        assert!(err.to_string().contains("previous item"));
    }
}
