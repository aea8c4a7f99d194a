use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::{parse_json_path, ParseError, PathSegment};

/// IndexPath is the projection of a JSONPath onto the search index:
/// the flattened field name, and the nested scope it lives under, if any.
///
/// ```text
/// $.user.status          -> field "user.status"
/// $.tags[*]              -> field "tags"
/// $.items[*].productId   -> field "items.productId", nested under "items"
/// $.order.items[*].price -> field "order.items.price", nested under "order.items"
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPath {
    pub field: String,
    pub nested_path: Option<String>,
}

impl IndexPath {
    pub fn is_nested(&self) -> bool {
        self.nested_path.is_some()
    }

    /// The property name relative to the nested scope,
    /// or the whole field when not nested. A trailing array marker on the
    /// final segment makes the scope cover the whole field, leaving an empty
    /// inner name.
    pub fn inner_name(&self) -> &str {
        match &self.nested_path {
            Some(nested) if nested.len() < self.field.len() => &self.field[nested.len() + 1..],
            Some(_) => "",
            None => &self.field,
        }
    }
}

/// Project parsed path segments onto the index. A path with an array marker
/// is nested under the scope ending at its first marker, except that a
/// single-segment `$.tags[*]` (an array of primitives at the root) indexes
/// as a plain multi-valued field.
pub fn to_index_path(segments: &[PathSegment]) -> Result<IndexPath, ParseError> {
    if segments.is_empty() {
        return Err(ParseError::EmptyPath);
    }

    let names = segments.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
    let field = names.join(".");

    let array_first = segments.iter().position(|s| s.is_array);
    let nested_path = match array_first {
        Some(at) if segments.len() > 1 => Some(names[..=at].join(".")),
        _ => None,
    };

    Ok(IndexPath { field, nested_path })
}

/// Compile a search schema (logical name -> JSONPath) into the index mapping
/// document. Every logical field becomes a `keyword` leaf; paths sharing a
/// nested scope merge under a single `nested` property. The input and output
/// are both ordered, so equal schemas compile to byte-equal mappings.
pub fn schema_to_mapping(schema: &BTreeMap<String, String>) -> Result<Value, ParseError> {
    let mut properties = Map::new();
    let mut nested: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    for json_path in schema.values() {
        let segments = parse_json_path(json_path)?;
        let path = to_index_path(&segments)?;

        match &path.nested_path {
            Some(scope) => {
                nested
                    .entry(scope.clone())
                    .or_default()
                    .insert(path.inner_name().to_string(), json!({"type": "keyword"}));
            }
            None => {
                properties.insert(path.field, json!({"type": "keyword"}));
            }
        }
    }

    for (scope, props) in nested {
        properties.insert(
            scope,
            json!({
                "type": "nested",
                "properties": props,
            }),
        );
    }

    Ok(json!({"mappings": {"properties": properties}}))
}

/// The mapping used for a namespace before any schema has been set:
/// everything is dynamically mapped.
pub fn default_mapping() -> Value {
    json!({"mappings": {"dynamic": true, "properties": {}}})
}

#[cfg(test)]
mod test {
    use super::*;

    fn index_path(path: &str) -> IndexPath {
        to_index_path(&parse_json_path(path).unwrap()).unwrap()
    }

    #[test]
    fn simple_field() {
        assert_eq!(
            index_path("$.user.status"),
            IndexPath {
                field: "user.status".to_string(),
                nested_path: None,
            }
        );
    }

    #[test]
    fn array_of_primitives_is_not_nested() {
        assert_eq!(
            index_path("$.tags[*]"),
            IndexPath {
                field: "tags".to_string(),
                nested_path: None,
            }
        );
    }

    #[test]
    fn nested_field() {
        let path = index_path("$.items[*].productId");
        assert_eq!(path.field, "items.productId");
        assert_eq!(path.nested_path.as_deref(), Some("items"));
        assert_eq!(path.inner_name(), "productId");
    }

    #[test]
    fn nested_field_below_object() {
        let path = index_path("$.order.items[*].price");
        assert_eq!(path.field, "order.items.price");
        assert_eq!(path.nested_path.as_deref(), Some("order.items"));
        assert_eq!(path.inner_name(), "price");
    }

    #[test]
    fn trailing_array_below_object_scopes_the_whole_field() {
        let path = index_path("$.order.tags[*]");
        assert_eq!(path.field, "order.tags");
        assert_eq!(path.nested_path.as_deref(), Some("order.tags"));
        assert_eq!(path.inner_name(), "");
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert_eq!(to_index_path(&[]), Err(ParseError::EmptyPath));
    }

    fn schema(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn mapping_with_only_simple_fields() {
        let mapping =
            schema_to_mapping(&schema(&[("status", "$.status"), ("userId", "$.user.id")])).unwrap();
        assert_eq!(
            mapping,
            json!({
                "mappings": {
                    "properties": {
                        "status": {"type": "keyword"},
                        "user.id": {"type": "keyword"},
                    }
                }
            })
        );
    }

    #[test]
    fn mapping_groups_nested_fields() {
        let mapping = schema_to_mapping(&schema(&[
            ("status", "$.status"),
            ("productId", "$.items[*].productId"),
        ]))
        .unwrap();
        assert_eq!(
            mapping,
            json!({
                "mappings": {
                    "properties": {
                        "status": {"type": "keyword"},
                        "items": {
                            "type": "nested",
                            "properties": {
                                "productId": {"type": "keyword"},
                            },
                        },
                    }
                }
            })
        );
    }

    #[test]
    fn mapping_merges_shared_nested_scope() {
        let mapping = schema_to_mapping(&schema(&[
            ("productId", "$.items[*].productId"),
            ("quantity", "$.items[*].quantity"),
        ]))
        .unwrap();
        assert_eq!(
            mapping,
            json!({
                "mappings": {
                    "properties": {
                        "items": {
                            "type": "nested",
                            "properties": {
                                "productId": {"type": "keyword"},
                                "quantity": {"type": "keyword"},
                            },
                        },
                    }
                }
            })
        );
    }

    #[test]
    fn mapping_trailing_array_below_object_nests_with_empty_inner_name() {
        let mapping = schema_to_mapping(&schema(&[("itemTags", "$.order.tags[*]")])).unwrap();
        assert_eq!(
            mapping,
            json!({
                "mappings": {
                    "properties": {
                        "order.tags": {
                            "type": "nested",
                            "properties": {
                                "": {"type": "keyword"},
                            },
                        },
                    }
                }
            })
        );
    }

    #[test]
    fn mapping_array_of_primitives_stays_flat() {
        let mapping = schema_to_mapping(&schema(&[("tags", "$.tags[*]")])).unwrap();
        assert_eq!(
            mapping,
            json!({
                "mappings": {
                    "properties": {
                        "tags": {"type": "keyword"},
                    }
                }
            })
        );
    }

    #[test]
    fn mapping_compilation_is_deterministic() {
        let schema = schema(&[
            ("b", "$.b"),
            ("a", "$.items[*].a"),
            ("c", "$.items[*].c"),
            ("d", "$.other[*].d"),
        ]);
        let first = serde_json::to_vec(&schema_to_mapping(&schema).unwrap()).unwrap();
        let second = serde_json::to_vec(&schema_to_mapping(&schema).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn mapping_surfaces_path_errors() {
        assert!(matches!(
            schema_to_mapping(&schema(&[("bad", "$.a..b")])),
            Err(ParseError::EmptySegment(_))
        ));
    }
}
