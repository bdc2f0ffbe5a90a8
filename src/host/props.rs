//! Property diffing between two props of the same host element.

use indexmap::IndexMap;

use crate::types::{Node, PropValue, Props};

/// Ordered `(name, new value)` changes. `Null` means "remove".
///
/// A `style` change is a single nested `PropValue::Style` entry where a
/// removed style name maps to `""`.
pub type UpdatePayload = Vec<(String, PropValue)>;

pub(crate) const CHILDREN: &str = "children";
const STYLE: &str = "style";

/// Check if `children` should be assigned as text instead of reconciled.
pub fn is_text_only_children(props: &Props) -> bool {
    props.children.is_text()
}

/// Compute the changes from `old` to `new`. Returns `None` when nothing changed.
pub fn diff_properties(old: &Props, new: &Props) -> Option<UpdatePayload> {
    let mut payload = UpdatePayload::new();
    let mut style_updates: IndexMap<String, String> = IndexMap::new();
    let mut style_changed = false;

    // Removed props.
    for (name, old_value) in &old.values {
        if new.values.contains_key(name) {
            continue;
        }
        if name == STYLE {
            if let Some(old_style) = old_value.as_style() {
                for style_name in old_style.keys() {
                    style_updates.insert(style_name.clone(), String::new());
                }
                style_changed = true;
            }
        } else {
            payload.push((name.clone(), PropValue::Null));
        }
    }

    // Added or changed props.
    for (name, new_value) in &new.values {
        let old_value = old.values.get(name);
        if old_value == Some(new_value) {
            continue;
        }
        if name == STYLE {
            let old_style = old_value.and_then(PropValue::as_style);
            let new_style = new_value.as_style();
            if diff_style(old_style, new_style, &mut style_updates) {
                style_changed = true;
            }
        } else {
            payload.push((name.clone(), new_value.clone()));
        }
    }

    // Text-only children are assigned directly.
    match (&old.children, &new.children) {
        (Node::Text(old_text), Node::Text(new_text)) if old_text != new_text => {
            payload.push((CHILDREN.to_string(), PropValue::Str(new_text.clone())));
        }
        (_, Node::Text(new_text)) if !old.children.is_text() => {
            payload.push((CHILDREN.to_string(), PropValue::Str(new_text.clone())));
        }
        (Node::Text(_), new_children) if !new_children.is_text() => {
            payload.push((CHILDREN.to_string(), PropValue::Null));
        }
        _ => {}
    }

    if style_changed && !style_updates.is_empty() {
        payload.push((STYLE.to_string(), PropValue::Style(style_updates)));
    }

    (!payload.is_empty()).then_some(payload)
}

/// Collect style changes into `updates`. Returns `true` if anything changed.
fn diff_style(
    old: Option<&IndexMap<String, String>>,
    new: Option<&IndexMap<String, String>>,
    updates: &mut IndexMap<String, String>,
) -> bool {
    let before = updates.len();
    if let Some(old) = old {
        for name in old.keys() {
            if new.is_none_or(|new| !new.contains_key(name)) {
                updates.insert(name.clone(), String::new());
            }
        }
    }
    if let Some(new) = new {
        for (name, value) in new {
            if old.and_then(|old| old.get(name)) != Some(value) {
                updates.insert(name.clone(), value.clone());
            }
        }
    }
    updates.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Element;
    use pretty_assertions::assert_eq;

    fn props(builder: crate::types::ElementBuilder) -> Props {
        (*builder.build().props).clone()
    }

    #[test]
    fn test_identical_props_have_no_payload() {
        let a = props(Element::host("div").prop("id", "a").content("x"));
        let b = props(Element::host("div").prop("id", "a").content("x"));
        assert_eq!(diff_properties(&a, &b), None);
    }

    #[test]
    fn test_changed_and_removed_props() {
        let old = props(Element::host("div").prop("id", "a").prop("title", "t"));
        let new = props(Element::host("div").prop("id", "b").prop("hidden", true));
        assert_eq!(
            diff_properties(&old, &new),
            Some(vec![
                ("title".to_string(), PropValue::Null),
                ("id".to_string(), PropValue::from("b")),
                ("hidden".to_string(), PropValue::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_text_children_change() {
        let old = props(Element::host("span").content("x"));
        let new = props(Element::host("span").content("y"));
        assert_eq!(
            diff_properties(&old, &new),
            Some(vec![("children".to_string(), PropValue::from("y"))])
        );

        let list = props(Element::host("span").child("y"));
        assert_eq!(
            diff_properties(&old, &list),
            Some(vec![("children".to_string(), PropValue::Null)])
        );
        assert_eq!(
            diff_properties(&list, &new),
            Some(vec![("children".to_string(), PropValue::from("y"))])
        );
    }

    #[test]
    fn test_style_is_nested_and_last() {
        let old = props(
            Element::host("div")
                .style([("color", "red"), ("margin", "0")])
                .prop("id", "a"),
        );
        let new = props(
            Element::host("div")
                .style([("color", "blue"), ("padding", "1")])
                .prop("id", "b"),
        );

        let mut style = IndexMap::new();
        style.insert("margin".to_string(), String::new());
        style.insert("color".to_string(), "blue".to_string());
        style.insert("padding".to_string(), "1".to_string());
        assert_eq!(
            diff_properties(&old, &new),
            Some(vec![
                ("id".to_string(), PropValue::from("b")),
                ("style".to_string(), PropValue::Style(style)),
            ])
        );
    }

    #[test]
    fn test_removed_style_clears_every_name() {
        let old = props(Element::host("div").style([("color", "red")]));
        let new = props(Element::host("div"));

        let mut style = IndexMap::new();
        style.insert("color".to_string(), String::new());
        assert_eq!(
            diff_properties(&old, &new),
            Some(vec![("style".to_string(), PropValue::Style(style))])
        );
    }
}
