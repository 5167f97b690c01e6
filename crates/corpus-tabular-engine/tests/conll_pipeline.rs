use corpus_tabular_engine::convert::{ConvertOptions, TableConverter};
use corpus_tabular_engine::model::{
    AnnotationManifest, ContainerId, EdgeSource, ItemId, LayerManifest, MemoryCorpus, Value,
    ValueType,
};
use corpus_tabular_engine::schema::{
    AttributeSchema, BlockSchema, ColumnSchema, ResolverId, ResolverSpec, Separator, TableSchema,
};

use pretty_assertions::assert_eq;
use rstest::rstest;

/// CoNLL-style format: form, pos, head, chunk columns, one sentence per
/// blank-line-separated block, `#` comment lines carrying sentence metadata.
fn conll_schema(chunk_strategy: &str) -> TableSchema {
    let root = BlockSchema::new("tok")
        .with_end(AttributeSchema::empty_line())
        .with_attribute(
            AttributeSchema::regex("^#\\s*(.+)$")
                .with_resolver(ResolverSpec::new(ResolverId::Metadata)),
        )
        .with_column(ColumnSchema::new("form", "tok").with_key("form"))
        .with_column(ColumnSchema::new("pos", "tok").with_key("pos"))
        .with_column(
            ColumnSchema::new("head", "syntax")
                .with_resolver(ResolverSpec::new(ResolverId::Dependency)),
        )
        .with_column(
            ColumnSchema::new("chunk", "chunk").with_resolver(
                ResolverSpec::new(ResolverId::Segments)
                    .with_option("strategy", chunk_strategy),
            ),
        );
    TableSchema::new(Separator::Tab, "main", root).expect("schema is valid")
}

fn conll_corpus() -> MemoryCorpus {
    let mut corpus = MemoryCorpus::with_estimates(
        [
            LayerManifest::new("tok")
                .with_annotation(AnnotationManifest::new("form", ValueType::String))
                .with_annotation(AnnotationManifest::new("pos", ValueType::String))
                .with_annotation(AnnotationManifest::new("sent_id", ValueType::String)),
            LayerManifest::new("syntax"),
            LayerManifest::new("chunk"),
        ],
        &[("tok", 32)],
    );
    corpus.add_mapping("tok", "chunk");
    corpus.add_mapping("chunk", "tok");
    corpus
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(format!(
        "{}/tests/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    ))
    .expect("fixture exists")
}

#[test]
fn converts_a_two_sentence_treebank() {
    let schema = conll_schema("beginning");
    let corpus = conll_corpus();
    let converter =
        TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).unwrap();
    let report = converter.convert_str(&read_fixture("two_sentences.conll")).unwrap();

    // Two sentences of two tokens each.
    assert_eq!(report.items.get("tok"), Some(&4));
    assert_eq!(report.containers.get("tok"), Some(&2));
    assert_eq!(
        corpus.members("tok", ContainerId(0)),
        vec![ItemId(0), ItemId(1)]
    );
    assert_eq!(
        corpus.members("tok", ContainerId(1)),
        vec![ItemId(2), ItemId(3)]
    );

    // Field values survive conversion unchanged.
    assert_eq!(
        corpus.annotation("tok", ItemId(0), "form"),
        Some(Value::String("The".into()))
    );
    assert_eq!(
        corpus.annotation("tok", ItemId(3), "pos"),
        Some(Value::String("VERB".into()))
    );

    // Comment metadata lands on the first token of its sentence.
    assert_eq!(
        corpus.annotation("tok", ItemId(0), "sent_id"),
        Some(Value::String("s1".into()))
    );
    assert_eq!(
        corpus.annotation("tok", ItemId(2), "sent_id"),
        Some(Value::String("s2".into()))
    );

    // One dependency structure per sentence, published under the sentence's
    // own index.
    let structures = corpus.structures("syntax");
    assert_eq!(structures.len(), 2);
    let (index, first) = &structures[0];
    assert_eq!(*index, 0);
    assert_eq!(first.nodes, vec![ItemId(0), ItemId(1)]);
    // "The" is governed by "dog"; "dog" hangs off the artificial root.
    assert_eq!(first.edges[0].source, EdgeSource::Item(ItemId(1)));
    assert_eq!(first.edges[0].target, ItemId(0));
    assert_eq!(first.edges[1].source, EdgeSource::Root);
    assert!(first.alive);
    assert!(!first.augmented);

    let (index, second) = &structures[1];
    assert_eq!(*index, 1);
    assert_eq!(second.boundary, Some(ContainerId(1)));

    // Chunk segments with both mapping directions persisted.
    assert_eq!(corpus.container_count("chunk"), 2);
    assert_eq!(
        corpus.mapping_entries("tok", "chunk"),
        vec![(vec![0, 1], vec![0]), (vec![2, 3], vec![1])]
    );
    assert_eq!(
        corpus.mapping_entries("chunk", "tok"),
        vec![(vec![0], vec![0, 1]), (vec![1], vec![2, 3])]
    );

    let summary = format!(
        "tok={} sentences={} structures={} segments={}",
        report.items.get("tok").copied().unwrap_or(0),
        report.containers.get("tok").copied().unwrap_or(0),
        structures.len(),
        corpus.container_count("chunk"),
    );
    insta::assert_snapshot!(summary, @"tok=4 sentences=2 structures=2 segments=2");
}

#[test]
fn head_values_map_back_to_token_positions() {
    // H = [0, 1, 1]: token 0 is root, tokens 1 and 2 hang off token 0.
    let schema = conll_schema("beginning");
    let corpus = conll_corpus();
    let converter =
        TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).unwrap();
    converter
        .convert_str("eats\tVERB\t0\tB\nfish\tNOUN\t1\tB\ndaily\tADV\t1\tB\n")
        .unwrap();

    let structures = corpus.structures("syntax");
    assert_eq!(structures.len(), 1);
    let (_, structure) = &structures[0];
    assert_eq!(structure.edges.len(), 3);
    assert_eq!(structure.edges[0].source, EdgeSource::Root);
    assert_eq!(structure.edges[1].source, EdgeSource::Item(ItemId(0)));
    assert_eq!(structure.edges[2].source, EdgeSource::Item(ItemId(0)));
}

#[test]
fn negative_head_aborts_the_file() {
    let schema = conll_schema("beginning");
    let corpus = conll_corpus();
    let converter =
        TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).unwrap();
    let err = converter
        .convert_str("ok\tX\t1\tB\nbad\tY\t-1\tB\n")
        .unwrap_err();

    assert!(err.to_string().contains("line 2"));
    assert!(err.to_string().contains("negative"));
    // Nothing was published for the aborted file.
    assert_eq!(corpus.structures("syntax").len(), 0);
}

#[rstest]
#[case::alternating("alternating", "a\na\nb\nb\nb\nc\n", vec![2, 3, 1])]
#[case::beginning("beginning", "B\nx\nB\nx\nx\n", vec![2, 3])]
#[case::ending("ending", "x\nE\nx\nx\n", vec![2])]
#[case::discontinuous("discontinuous", "x\nB\nx\nE\nx\n", vec![3])]
fn segmentation_strategies_group_as_declared(
    #[case] strategy: &str,
    #[case] input: &str,
    #[case] expected_sizes: Vec<usize>,
) {
    let root = BlockSchema::new("tok")
        .with_column(
            ColumnSchema::new("chunk", "chunk").with_resolver(
                ResolverSpec::new(ResolverId::Segments).with_option("strategy", strategy),
            ),
        );
    let schema = TableSchema::new(Separator::Tab, "main", root).unwrap();
    let corpus = MemoryCorpus::new([LayerManifest::new("tok"), LayerManifest::new("chunk")]);
    let converter =
        TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).unwrap();
    converter.convert_str(input).unwrap();

    let sizes: Vec<usize> = (0..corpus.container_count("chunk"))
        .map(|i| corpus.members("chunk", ContainerId(i)).len())
        .collect();
    assert_eq!(sizes, expected_sizes);
}

#[test]
fn nested_documents_keep_sentence_structure_mapping() {
    let sentence = BlockSchema::new("tok")
        .with_end(AttributeSchema::empty_line())
        .with_column(ColumnSchema::new("form", "tok").with_key("form"))
        .with_column(
            ColumnSchema::new("head", "syntax")
                .with_resolver(ResolverSpec::new(ResolverId::Dependency)),
        );
    let document = BlockSchema::new("doc")
        .with_begin(AttributeSchema::regex("^# newdoc"))
        .with_block(sentence);
    let schema = TableSchema::new(Separator::Tab, "main", document).unwrap();
    assert_eq!(schema.block_count(), 2);

    let corpus = MemoryCorpus::new([
        LayerManifest::new("doc"),
        LayerManifest::new("tok")
            .with_annotation(AnnotationManifest::new("form", ValueType::String)),
        LayerManifest::new("syntax"),
    ]);
    let converter =
        TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).unwrap();
    let report = converter
        .convert_str(&read_fixture("two_documents.conll"))
        .unwrap();

    assert_eq!(report.containers.get("doc"), Some(&2));
    assert_eq!(report.containers.get("tok"), Some(&3));
    assert_eq!(report.items.get("tok"), Some(&5));

    // Structures stay 1:1 with sentences across document boundaries.
    let structures = corpus.structures("syntax");
    assert_eq!(structures.len(), 3);
    for (expected, (index, structure)) in structures.iter().enumerate() {
        assert_eq!(*index, expected);
        assert_eq!(structure.boundary, Some(ContainerId(expected)));
    }
}

#[test]
fn whitespace_runs_separator_handles_aligned_columns() {
    let root = BlockSchema::new("tok")
        .with_column(ColumnSchema::new("form", "tok").with_key("form"))
        .with_column(ColumnSchema::new("pos", "tok").with_key("pos"));
    let schema = TableSchema::new(Separator::Whitespaces, "main", root).unwrap();
    let corpus = MemoryCorpus::new([LayerManifest::new("tok")
        .with_annotation(AnnotationManifest::new("form", ValueType::String))
        .with_annotation(AnnotationManifest::new("pos", ValueType::String))]);
    let converter =
        TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).unwrap();
    converter.convert_str("The    DET\ndog   NOUN\n").unwrap();

    assert_eq!(
        corpus.annotation("tok", ItemId(1), "pos"),
        Some(Value::String("NOUN".into()))
    );
}

#[test]
fn unknown_layer_fails_at_converter_construction() {
    let root = BlockSchema::new("tok")
        .with_column(ColumnSchema::new("form", "nowhere").with_key("form"));
    let schema = TableSchema::new(Separator::Tab, "main", root).unwrap();
    let corpus = MemoryCorpus::new([LayerManifest::new("tok")]);
    assert!(TableConverter::new(&schema, corpus.target(), ConvertOptions::default()).is_err());
}
