use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::convert::context::{Cursor, RawOverride};
use crate::error::{ConvertError, SchemaError};
use crate::model::{AnnotationSink, ItemId, LayerBinding};
use crate::schema::ResolverSpec;

use super::Resolve;
use super::basic::BasicResolver;

const DEFAULT_ASSIGN: &str = "=";
const DEFAULT_LIST_SEPARATOR: &str = ";";

/// Parses `key=value` assignments and delegates each value to the resolver
/// declared for its key.
///
/// Covers both the metadata-line form (one assignment per line) and the
/// property-list form (`k1=v1;k2=v2;...`). The key→resolver map is
/// precomputed from the layer's declared annotations; unknown keys are
/// stored verbatim only when the layer allows it.
pub struct KeyValueResolver {
    assign: String,
    /// Splits multiple assignments on one line; absent for the
    /// one-assignment metadata form.
    list_separator: Option<String>,
    entries: BTreeMap<String, BasicResolver>,
    allow_unknown: bool,
    sink: Rc<RefCell<dyn AnnotationSink>>,
}

impl KeyValueResolver {
    pub fn metadata(spec: &ResolverSpec, binding: &LayerBinding) -> Result<Self, SchemaError> {
        Self::build(spec, binding, None)
    }

    pub fn property_list(
        spec: &ResolverSpec,
        binding: &LayerBinding,
    ) -> Result<Self, SchemaError> {
        let separator = spec
            .option("separator")
            .unwrap_or(DEFAULT_LIST_SEPARATOR)
            .to_string();
        Self::build(spec, binding, Some(separator))
    }

    fn build(
        spec: &ResolverSpec,
        binding: &LayerBinding,
        list_separator: Option<String>,
    ) -> Result<Self, SchemaError> {
        let mut entries = BTreeMap::new();
        for annotation in &binding.manifest.annotations {
            entries.insert(
                annotation.key.clone(),
                BasicResolver::for_annotation(binding, &annotation.key)?,
            );
        }
        Ok(Self {
            assign: spec.option("assign").unwrap_or(DEFAULT_ASSIGN).to_string(),
            list_separator,
            entries,
            allow_unknown: binding.manifest.allow_unknown_keys,
            sink: Rc::clone(&binding.sink),
        })
    }

    fn apply(&mut self, assignment: &str, cx: &dyn Cursor) -> Result<(), ConvertError> {
        let (key, value) = assignment.split_once(self.assign.as_str()).ok_or_else(|| {
            ConvertError::content(
                cx.line(),
                cx.raw(),
                format!("expected a `key{}value` assignment", self.assign),
            )
        })?;
        let key = key.trim();
        let value = value.trim();

        if let Some(nested) = self.entries.get_mut(key) {
            let proxy = RawOverride::new(cx, value);
            nested.process(&proxy)?;
        } else if self.allow_unknown {
            self.sink.borrow_mut().set_string(cx.item(), key, value);
        } else {
            return Err(ConvertError::content(
                cx.line(),
                cx.raw(),
                format!("unknown property key `{key}`"),
            ));
        }
        Ok(())
    }
}

impl Resolve for KeyValueResolver {
    fn process(&mut self, cx: &dyn Cursor) -> Result<ItemId, ConvertError> {
        match self.list_separator.clone() {
            None => self.apply(cx.raw(), cx)?,
            Some(separator) => {
                for assignment in cx.raw().split(separator.as_str()) {
                    if assignment.trim().is_empty() {
                        continue;
                    }
                    self.apply(assignment, cx)?;
                }
            }
        }
        Ok(cx.item())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::context::ResolverContext;
    use crate::model::{
        AnnotationManifest, ContainerId, LayerManifest, MemorySink, MemoryStore, Value, ValueType,
    };
    use crate::schema::ResolverId;

    fn binding(allow_unknown: bool) -> (LayerBinding, Rc<RefCell<MemorySink>>) {
        let sink = Rc::new(RefCell::new(MemorySink::new()));
        let mut manifest = LayerManifest::new("sent")
            .with_annotation(AnnotationManifest::new("sent_id", ValueType::String))
            .with_annotation(AnnotationManifest::new("length", ValueType::Integer));
        if allow_unknown {
            manifest = manifest.allowing_unknown_keys();
        }
        let binding = LayerBinding::new(
            manifest,
            Rc::new(RefCell::new(MemoryStore::new())),
            Rc::clone(&sink) as Rc<RefCell<dyn AnnotationSink>>,
        );
        (binding, sink)
    }

    fn cx_with_raw(raw: &str) -> ResolverContext {
        let mut cx = ResolverContext::new();
        cx.reposition(ContainerId(0), ItemId(7), 2, 11);
        cx.set_raw(raw);
        cx
    }

    #[test]
    fn metadata_line_delegates_through_the_declared_resolver() {
        let (binding, sink) = binding(false);
        let spec = ResolverSpec::new(ResolverId::Metadata);
        let mut resolver = KeyValueResolver::metadata(&spec, &binding).unwrap();

        resolver.process(&cx_with_raw("length = 12")).unwrap();
        assert_eq!(
            sink.borrow().get(ItemId(7), "length"),
            Some(&Value::Integer(12))
        );
    }

    #[test]
    fn property_list_applies_every_assignment() {
        let (binding, sink) = binding(false);
        let spec = ResolverSpec::new(ResolverId::PropertyList);
        let mut resolver = KeyValueResolver::property_list(&spec, &binding).unwrap();

        resolver
            .process(&cx_with_raw("sent_id=s7;length=3"))
            .unwrap();
        assert_eq!(
            sink.borrow().get(ItemId(7), "sent_id"),
            Some(&Value::String("s7".into()))
        );
        assert_eq!(
            sink.borrow().get(ItemId(7), "length"),
            Some(&Value::Integer(3))
        );
    }

    #[test]
    fn unknown_key_fails_without_the_allow_flag() {
        let (binding, _sink) = binding(false);
        let spec = ResolverSpec::new(ResolverId::Metadata);
        let mut resolver = KeyValueResolver::metadata(&spec, &binding).unwrap();

        let err = resolver.process(&cx_with_raw("genre = news")).unwrap_err();
        assert!(err.to_string().contains("unknown property key"));
    }

    #[test]
    fn unknown_key_is_stored_verbatim_with_the_allow_flag() {
        let (binding, sink) = binding(true);
        let spec = ResolverSpec::new(ResolverId::Metadata);
        let mut resolver = KeyValueResolver::metadata(&spec, &binding).unwrap();

        resolver.process(&cx_with_raw("genre = news")).unwrap();
        assert_eq!(
            sink.borrow().get(ItemId(7), "genre"),
            Some(&Value::String("news".into()))
        );
    }

    #[test]
    fn missing_assignment_symbol_is_a_content_error() {
        let (binding, _sink) = binding(true);
        let spec = ResolverSpec::new(ResolverId::Metadata);
        let mut resolver = KeyValueResolver::metadata(&spec, &binding).unwrap();

        let err = resolver.process(&cx_with_raw("no assignment here")).unwrap_err();
        assert!(err.to_string().contains("assignment"));
    }

    #[test]
    fn custom_assignment_symbol() {
        let (binding, sink) = binding(false);
        let spec = ResolverSpec::new(ResolverId::Metadata).with_option("assign", ":");
        let mut resolver = KeyValueResolver::metadata(&spec, &binding).unwrap();

        resolver.process(&cx_with_raw("sent_id: s1")).unwrap();
        assert_eq!(
            sink.borrow().get(ItemId(7), "sent_id"),
            Some(&Value::String("s1".into()))
        );
    }
}
