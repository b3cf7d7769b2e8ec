use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::format::RowFormatter;
use crate::error::{LayoutError, Result};
use crate::model::{DEFAULT_LAYOUT_NAME, Key, Layout, LayoutSet, normalize};

/// Key objects sit at depth 5: document, `layouts`, entry, `layout`, key.
const KEY_OBJECT_DEPTH: usize = 5;

#[derive(Serialize)]
struct DocumentOut<'a> {
    layouts: IndexMap<&'a str, EntryOut<'a>>,
}

#[derive(Serialize)]
struct EntryOut<'a> {
    layout: &'a [Key],
}

#[derive(Deserialize)]
struct DocumentIn {
    layouts: IndexMap<String, EntryIn>,
}

#[derive(Deserialize)]
struct EntryIn {
    #[serde(default)]
    layout: Option<Vec<Key>>,
}

/// Serialize a layout set as `{"layouts": {name: {"layout": [...]}}}`.
///
/// Coordinates are written exactly as stored; no normalization happens here.
pub fn encode(set: &LayoutSet) -> Result<String> {
    let document = DocumentOut {
        layouts: set
            .iter()
            .map(|(name, layout)| {
                (
                    name,
                    EntryOut {
                        layout: layout.keys(),
                    },
                )
            })
            .collect(),
    };

    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, RowFormatter::new(KEY_OBJECT_DEPTH));
    document.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|err| LayoutError::malformed(err.to_string()))
}

/// Parse either a bare key list (named "Default") or a `layouts` mapping.
/// Every layout is normalized.
pub fn decode(input: &str) -> Result<LayoutSet> {
    let value: Value = serde_json::from_str(input)
        .map_err(|err| LayoutError::malformed(format!("invalid JSON: {err}")))?;

    let is_mapping = value
        .as_object()
        .is_some_and(|map| map.contains_key("layouts"));

    if value.is_array() {
        let keys: Vec<Key> = serde_json::from_value(value)
            .map_err(|err| LayoutError::malformed(format!("invalid key list: {err}")))?;
        let layout = build_layout(DEFAULT_LAYOUT_NAME, keys)?;
        return Ok(LayoutSet::single(layout));
    }
    if !is_mapping {
        return Err(LayoutError::malformed(
            "expected a list of keys or an object with a `layouts` mapping",
        ));
    }

    let document: DocumentIn = serde_json::from_value(value)
        .map_err(|err| LayoutError::malformed(format!("invalid `layouts` mapping: {err}")))?;
    if document.layouts.is_empty() {
        return Err(LayoutError::malformed("`layouts` mapping is empty"));
    }
    let mut set = LayoutSet::new();
    for (name, entry) in document.layouts {
        let keys = entry.layout.ok_or_else(|| {
            LayoutError::malformed(format!("layout \"{name}\" has no `layout` array"))
        })?;
        let layout = build_layout(&name, keys)?;
        set.insert(name, layout)?;
    }
    Ok(set)
}

fn build_layout(name: &str, keys: Vec<Key>) -> Result<Layout> {
    if keys.is_empty() {
        return Err(LayoutError::malformed(format!(
            "layout \"{name}\" has an empty `layout` array"
        )));
    }
    normalize(Layout::new(keys)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Units, normalize_set};

    fn h(value: i64) -> Units {
        Units::from_hundredths(value)
    }

    #[test]
    fn shorthand_list_becomes_default_layout() {
        let set = decode(r#"[{"x": 0, "y": 0}, {"x": 1, "y": 0}]"#).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec![DEFAULT_LAYOUT_NAME]);
        let layout = set.get(DEFAULT_LAYOUT_NAME).unwrap();
        assert_eq!(layout.len(), 2);
        assert!(layout.keys().iter().all(|k| k.x >= Units::ZERO && k.y >= Units::ZERO));
    }

    #[test]
    fn shorthand_list_is_normalized() {
        let set = decode(r#"[{"x": 2, "y": -1}, {"x": 3.5, "y": 0}]"#).unwrap();
        let keys = set.get(DEFAULT_LAYOUT_NAME).unwrap().keys();
        assert_eq!((keys[0].x, keys[0].y), (h(0), h(0)));
        assert_eq!((keys[1].x, keys[1].y), (h(150), h(100)));
    }

    #[test]
    fn named_layouts_keep_document_order() {
        let input = r#"{"layouts": {
            "Split": {"layout": [{"x": 1, "y": 1}]},
            "Alpha": {"layout": [{"x": 0, "y": 0, "w": 2}]}
        }}"#;
        let set = decode(input).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Split", "Alpha"]);
        let split = set.get("Split").unwrap().keys();
        assert_eq!((split[0].x, split[0].y), (h(0), h(0)));
        assert_eq!(set.get("Alpha").unwrap().keys()[0].w, Some(h(200)));
    }

    #[test]
    fn ignores_unknown_key_fields() {
        let set = decode(r#"[{"x": 0, "y": 0, "matrix": [0, 0], "label": "Esc"}]"#).unwrap();
        assert_eq!(set.get(DEFAULT_LAYOUT_NAME).unwrap().len(), 1);
    }

    #[test]
    fn rejects_other_shapes() {
        for input in [
            "42",
            r#""layouts""#,
            r#"{"keys": []}"#,
            r#"{"layouts": {}}"#,
            r#"{"layouts": {"A": {}}}"#,
            r#"{"layouts": {"A": {"layout": []}}}"#,
            r#"[{"y": 0}]"#,
            "[]",
            "not json",
        ] {
            assert!(
                matches!(decode(input), Err(LayoutError::MalformedInput(_))),
                "input {input} should be rejected"
            );
        }
    }

    #[test]
    fn coordinates_spanning_the_whole_range_are_rejected() {
        assert!(matches!(
            decode(r#"[{"x": 9e16, "y": 0}, {"x": -9e16, "y": 0}]"#),
            Err(LayoutError::MalformedInput(_))
        ));
    }

    #[test]
    fn rejects_non_positive_sizes() {
        assert!(matches!(
            decode(r#"[{"x": 0, "y": 0, "h": 0}]"#),
            Err(LayoutError::InvalidKey { index: 0, .. })
        ));
    }

    #[test]
    fn encode_omits_defaults_and_collapses_keys() {
        let layout = Layout::new(vec![
            Key::new(h(0), h(0)).with_size(Units::ONE, Units::ONE),
            Key::new(h(100), h(0)).with_size(h(150), Units::ONE),
            Key::new(h(250), h(25))
                .with_rotation(h(-1500))
                .with_origin(h(250), h(125)),
        ])
        .unwrap();
        let json = encode(&LayoutSet::single(layout)).unwrap();
        let expected = [
            "{",
            "  \"layouts\": {",
            "    \"Default\": {",
            "      \"layout\": [",
            "        { \"x\": 0, \"y\": 0 },",
            "        { \"x\": 1, \"y\": 0, \"w\": 1.5 },",
            "        { \"x\": 2.5, \"y\": 0.25, \"r\": -15, \"rx\": 2.5, \"ry\": 1.25 }",
            "      ]",
            "    }",
            "  }",
            "}",
        ]
        .join("\n");
        assert_eq!(json, expected);
    }

    #[test]
    fn encode_preserves_non_normalized_coordinates() {
        let layout = Layout::new(vec![Key::new(h(-100), h(300))]).unwrap();
        let json = encode(&LayoutSet::single(layout)).unwrap();
        assert!(json.contains("{ \"x\": -1, \"y\": 3 }"));
    }

    #[test]
    fn round_trip_equals_normalized_input() {
        let mut set = LayoutSet::new();
        set.insert(
            "Left",
            Layout::new(vec![
                Key::new(h(-50), h(10)).with_size(h(125), h(200)),
                Key::new(h(75), h(-40))
                    .with_rotation(h(3000))
                    .with_origin(h(0), h(-20)),
            ])
            .unwrap(),
        )
        .unwrap();
        set.insert("Right", Layout::new(vec![Key::new(h(300), h(300))]).unwrap())
            .unwrap();

        let decoded = decode(&encode(&set).unwrap()).unwrap();
        assert_eq!(decoded, normalize_set(set).unwrap());
    }
}
