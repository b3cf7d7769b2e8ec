use crate::error::{LayoutError, Result};
use crate::fixed;
use crate::model::{DEFAULT_LAYOUT_NAME, Key, Layout, LayoutSet, Units, normalize};

use super::tree::{DeviceTree, DtsNode, SourceTree};

/// `compatible` string identifying physical layout nodes.
pub const PHYSICAL_LAYOUT_COMPATIBLE: &str = "zmk,physical-layout";

const INCLUDE_DIRECTIVE: &str = "#include <physical_layouts.dtsi>";
const INDENT: &str = "    ";
const KEYS_HEADER: &str = "keys  //                     w   h    x    y     rot    rx    ry";

/// Position binding kinds accepted inside a `keys` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionBinding {
    /// `&key_physical_attrs w h x y rot rx ry`
    KeyPhysicalAttrs,
}

impl PositionBinding {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim_start_matches('&') {
            "key_physical_attrs" => Some(Self::KeyPhysicalAttrs),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::KeyPhysicalAttrs => "&key_physical_attrs",
        }
    }

    fn parse(self, binding: &str, args: &[&str]) -> Result<Key> {
        match self {
            Self::KeyPhysicalAttrs => {
                let [w, h, x, y, r, rx, ry] = args else {
                    return Err(LayoutError::malformed(format!(
                        "`{binding}` expects 7 parameters, found {}",
                        args.len()
                    )));
                };
                let [w, h, x, y, r, rx, ry] = [w, h, x, y, r, rx, ry].map(|arg| fixed::decode(arg));
                let r = r?;
                let mut key = Key::new(x?, y?).with_size(w?, h?).with_rotation(r);
                let (rx, ry) = (rx?, ry?);
                if !r.is_zero() {
                    key = key.with_origin(rx, ry);
                }
                Ok(key)
            }
        }
    }
}

fn parse_binding(binding: &str) -> Result<Key> {
    let parts: Vec<&str> = binding.split_whitespace().collect();
    let Some((tag, args)) = parts.split_first() else {
        return Err(LayoutError::malformed("empty position binding"));
    };
    let kind = PositionBinding::from_tag(tag).ok_or_else(|| LayoutError::UnrecognizedBinding {
        tag: tag.to_string(),
    })?;
    kind.parse(binding, args)
}

/// Read physical layouts from an already parsed devicetree.
///
/// Falls back to a root level `keys` property, named "Default", when no node
/// declares `compatible = "zmk,physical-layout"`.
pub fn decode_tree<T: DeviceTree>(tree: &T) -> Result<LayoutSet> {
    let nodes = tree.nodes_with_compatible(PHYSICAL_LAYOUT_COMPATIBLE);

    let mut defined = Vec::with_capacity(nodes.len().max(1));
    if nodes.is_empty() {
        let keys = tree
            .root()
            .phandle_array("keys")
            .filter(|keys| !keys.is_empty())
            .ok_or(LayoutError::NoLayoutFound)?;
        defined.push((DEFAULT_LAYOUT_NAME.to_string(), keys));
    } else {
        for node in nodes {
            let display_name =
                node.string("display-name")
                    .ok_or_else(|| LayoutError::MissingDisplayName {
                        node: node.name().to_string(),
                    })?;
            let keys = node
                .phandle_array("keys")
                .ok_or_else(|| LayoutError::MissingKeys {
                    display_name: display_name.clone(),
                })?;
            defined.push((display_name, keys));
        }
    }

    let mut set = LayoutSet::new();
    for (display_name, bindings) in defined {
        let keys = bindings
            .iter()
            .map(|binding| parse_binding(binding))
            .collect::<Result<Vec<_>>>()?;
        set.insert(display_name, normalize(Layout::new(keys)?)?)?;
    }
    Ok(set)
}

/// Parse devicetree source text and read its physical layouts.
pub fn decode(source: &str) -> Result<LayoutSet> {
    decode_tree(&SourceTree::parse(source)?)
}

/// Write every layout as a `zmk,physical-layout` node.
///
/// `kscan{i}` and `matrix_transform{i}` are emitted as references for the
/// consumer to define; nothing here checks that they exist.
pub fn encode(set: &LayoutSet) -> String {
    let blocks: Vec<String> = set
        .iter()
        .enumerate()
        .map(|(idx, (name, layout))| layout_block(idx, name, layout))
        .collect();

    let mut out = String::new();
    out.push_str(INCLUDE_DIRECTIVE);
    out.push_str("\n\n/ {\n");
    out.push_str(&indent(&blocks.join("\n"), INDENT));
    out.push_str("};\n");
    out
}

fn layout_block(idx: usize, name: &str, layout: &Layout) -> String {
    let bindings: Vec<String> = layout.keys().iter().map(key_binding).collect();
    let separator = format!("\n{INDENT}, ");
    let keys = format!(
        "\n{KEYS_HEADER}\n{INDENT}= {}\n{INDENT};\n",
        bindings.join(separator.as_str())
    );

    format!(
        "physical_layout{idx}: physical_layout_{idx} {{\n\
         {INDENT}compatible = \"{PHYSICAL_LAYOUT_COMPATIBLE}\";\n\
         {INDENT}display-name = \"{}\";\n\
         \n\
         {INDENT}kscan = <&kscan{idx}>;\n\
         {INDENT}transform = <&matrix_transform{idx}>;\n\
         {}}};\n",
        escape(name),
        indent(&keys, INDENT),
    )
}

fn key_binding(key: &Key) -> String {
    format!(
        "<{} {:>3} {:>3} {:>4} {:>4} {:>7} {:>5} {:>5}>",
        PositionBinding::KeyPhysicalAttrs.tag(),
        fixed::encode(key.w()),
        fixed::encode(key.h()),
        fixed::encode(key.x),
        fixed::encode(key.y),
        fixed::encode(key.r()),
        fixed::encode(key.rx.unwrap_or(Units::ZERO)),
        fixed::encode(key.ry.unwrap_or(Units::ZERO)),
    )
}

/// Prefix every line that has non-whitespace content.
fn indent(text: &str, prefix: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect()
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::normalize_set;

    fn h(value: i64) -> Units {
        Units::from_hundredths(value)
    }

    struct FakeNode {
        name: &'static str,
        display_name: Option<&'static str>,
        keys: Option<Vec<&'static str>>,
    }

    impl DtsNode for FakeNode {
        fn name(&self) -> &str {
            self.name
        }

        fn string(&self, property: &str) -> Option<String> {
            match property {
                "display-name" => self.display_name.map(str::to_string),
                _ => None,
            }
        }

        fn phandle_array(&self, property: &str) -> Option<Vec<String>> {
            match property {
                "keys" => self
                    .keys
                    .as_ref()
                    .map(|keys| keys.iter().map(|k| k.to_string()).collect()),
                _ => None,
            }
        }
    }

    struct FakeTree {
        root: FakeNode,
        layouts: Vec<FakeNode>,
    }

    impl FakeTree {
        fn with_layouts(layouts: Vec<FakeNode>) -> Self {
            Self {
                root: FakeNode {
                    name: "/",
                    display_name: None,
                    keys: None,
                },
                layouts,
            }
        }
    }

    impl DeviceTree for FakeTree {
        type Node = FakeNode;

        fn nodes_with_compatible(&self, compatible: &str) -> Vec<&FakeNode> {
            assert_eq!(compatible, PHYSICAL_LAYOUT_COMPATIBLE);
            self.layouts.iter().collect()
        }

        fn root(&self) -> &FakeNode {
            &self.root
        }
    }

    fn two_key_set() -> LayoutSet {
        LayoutSet::single(
            Layout::new(vec![
                Key::new(h(0), h(0)),
                Key::new(h(100), h(0)).with_size(h(150), Units::ONE),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn encode_matches_template() {
        let expected = "\
#include <physical_layouts.dtsi>

/ {
    physical_layout0: physical_layout_0 {
        compatible = \"zmk,physical-layout\";
        display-name = \"Default\";

        kscan = <&kscan0>;
        transform = <&matrix_transform0>;

        keys  //                     w   h    x    y     rot    rx    ry
            = <&key_physical_attrs 100 100    0    0       0     0     0>
            , <&key_physical_attrs 150 100  100    0       0     0     0>
            ;
    };
};
";
        assert_eq!(encode(&two_key_set()), expected);
    }

    #[test]
    fn encode_separates_layouts_and_indexes_references() {
        let mut set = two_key_set();
        set.insert(
            "Alt \"B\"",
            Layout::new(vec![Key::new(h(-100), h(50))]).unwrap(),
        )
        .unwrap();
        let dts = encode(&set);
        assert!(dts.contains("            ;\n    };\n\n    physical_layout1: physical_layout_1 {\n"));
        assert!(dts.contains("display-name = \"Alt \\\"B\\\"\";"));
        assert!(dts.contains("kscan = <&kscan1>;"));
        assert!(dts.contains("transform = <&matrix_transform1>;"));
        assert!(dts.contains("<&key_physical_attrs 100 100 (-100)   50       0     0     0>"));
    }

    #[test]
    fn decode_reads_encoded_text() {
        let set = decode(&encode(&two_key_set())).unwrap();
        assert_eq!(set, two_key_set());
    }

    #[test]
    fn round_trip_equals_normalized_input() {
        let mut set = LayoutSet::new();
        set.insert(
            "Thumbs",
            Layout::new(vec![
                Key::new(h(-125), h(300)).with_size(h(200), h(100)),
                Key::new(h(50), h(275))
                    .with_rotation(h(-2250))
                    .with_origin(h(-25), h(400)),
                Key::new(h(175), h(310)).with_rotation(h(1000)).with_origin(h(0), h(0)),
            ])
            .unwrap(),
        )
        .unwrap();
        set.insert("Flat", Layout::new(vec![Key::new(h(7), h(9))]).unwrap())
            .unwrap();

        let decoded = decode(&encode(&set)).unwrap();
        assert_eq!(decoded, normalize_set(set).unwrap());
        assert_eq!(decoded.names().collect::<Vec<_>>(), vec!["Thumbs", "Flat"]);
    }

    #[test]
    fn unrotated_binding_drops_origin() {
        let tree = FakeTree::with_layouts(vec![FakeNode {
            name: "layout_0",
            display_name: Some("Default"),
            keys: Some(vec!["&key_physical_attrs 100 100 0 0 0 50 50"]),
        }]);
        let set = decode_tree(&tree).unwrap();
        let key = set.get("Default").unwrap().keys()[0];
        assert_eq!(key.rx, None);
        assert_eq!(key.ry, None);
    }

    #[test]
    fn rotated_binding_keeps_origin_and_normalizes_it() {
        let tree = FakeTree::with_layouts(vec![FakeNode {
            name: "layout_0",
            display_name: Some("Rot"),
            keys: Some(vec![
                "&key_physical_attrs 100 100 100 200 (-1500) 150 250",
                "&key_physical_attrs 100 100 300 250 0 0 0",
            ]),
        }]);
        let set = decode_tree(&tree).unwrap();
        let keys = set.get("Rot").unwrap().keys();
        assert_eq!((keys[0].x, keys[0].y), (h(0), h(0)));
        assert_eq!(keys[0].r, Some(h(-1500)));
        assert_eq!((keys[0].rx, keys[0].ry), (Some(h(50)), Some(h(50))));
        assert_eq!((keys[1].x, keys[1].y), (h(200), h(50)));
    }

    #[test]
    fn missing_display_name_names_the_node() {
        let tree = FakeTree::with_layouts(vec![FakeNode {
            name: "physical_layout_7",
            display_name: None,
            keys: Some(vec!["&key_physical_attrs 100 100 0 0 0 0 0"]),
        }]);
        match decode_tree(&tree) {
            Err(LayoutError::MissingDisplayName { node }) => assert_eq!(node, "physical_layout_7"),
            other => panic!("expected missing display name, got {other:?}"),
        }
    }

    #[test]
    fn missing_keys_names_the_layout() {
        let tree = FakeTree::with_layouts(vec![FakeNode {
            name: "physical_layout_0",
            display_name: Some("Ortho"),
            keys: None,
        }]);
        match decode_tree(&tree) {
            Err(LayoutError::MissingKeys { display_name }) => assert_eq!(display_name, "Ortho"),
            other => panic!("expected missing keys, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_binding_is_rejected() {
        let tree = FakeTree::with_layouts(vec![FakeNode {
            name: "physical_layout_0",
            display_name: Some("Default"),
            keys: Some(vec![
                "&key_physical_attrs 100 100 0 0 0 0 0",
                "&other_attrs 1 2 3",
            ]),
        }]);
        match decode_tree(&tree) {
            Err(LayoutError::UnrecognizedBinding { tag }) => assert_eq!(tag, "&other_attrs"),
            other => panic!("expected unrecognized binding, got {other:?}"),
        }
    }

    #[test]
    fn wrong_parameter_count_is_malformed() {
        let tree = FakeTree::with_layouts(vec![FakeNode {
            name: "physical_layout_0",
            display_name: Some("Default"),
            keys: Some(vec!["&key_physical_attrs 100 100 0 0 0"]),
        }]);
        assert!(matches!(
            decode_tree(&tree),
            Err(LayoutError::MalformedInput(_))
        ));
    }

    #[test]
    fn bad_number_is_reported() {
        let tree = FakeTree::with_layouts(vec![FakeNode {
            name: "physical_layout_0",
            display_name: Some("Default"),
            keys: Some(vec!["&key_physical_attrs 100 100 (-50 0 0 0 0"]),
        }]);
        match decode_tree(&tree) {
            Err(LayoutError::MalformedNumber { token }) => assert_eq!(token, "(-50"),
            other => panic!("expected malformed number, got {other:?}"),
        }
    }

    #[test]
    fn unrotated_binding_still_checks_origin_numbers() {
        match decode("/ { keys = <&key_physical_attrs 100 100 0 0 0 abc xyz>; };") {
            Err(LayoutError::MalformedNumber { token }) => assert_eq!(token, "abc"),
            other => panic!("expected malformed number, got {other:?}"),
        }
    }

    #[test]
    fn coordinates_spanning_the_whole_range_are_rejected() {
        let source = "/ { keys = <&key_physical_attrs 100 100 9223372036854775807 0 0 0 0>\n\
                      , <&key_physical_attrs 100 100 (-9223372036854775808) 0 0 0 0>; };";
        assert!(matches!(decode(source), Err(LayoutError::MalformedInput(_))));
    }

    #[test]
    fn falls_back_to_root_keys() {
        let source = "\
/ {
    keys = <&key_physical_attrs 100 100 100 100 0 0 0>
         , <&key_physical_attrs 100 100 200 100 0 0 0>;
};
";
        let set = decode(source).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec![DEFAULT_LAYOUT_NAME]);
        let keys = set.get(DEFAULT_LAYOUT_NAME).unwrap().keys();
        assert_eq!((keys[0].x, keys[0].y), (h(0), h(0)));
        assert_eq!((keys[1].x, keys[1].y), (h(100), h(0)));
    }

    #[test]
    fn no_layout_at_all_fails() {
        assert!(matches!(
            decode("/ { chosen { }; };"),
            Err(LayoutError::NoLayoutFound)
        ));
        assert!(matches!(
            decode_tree(&FakeTree::with_layouts(Vec::new())),
            Err(LayoutError::NoLayoutFound)
        ));
    }

    #[test]
    fn empty_keys_array_is_an_empty_layout() {
        assert!(matches!(
            decode("/ { l { compatible = \"zmk,physical-layout\"; display-name = \"E\"; keys = <>; }; };"),
            Err(LayoutError::EmptyLayout)
        ));
    }
}
