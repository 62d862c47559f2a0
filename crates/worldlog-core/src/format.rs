// ABOUTME: Per-action display formatting for logged entries.
// ABOUTME: The formatter table is built at construction and immutable afterward.

use std::collections::HashMap;

use crate::entry::Tags;

/// A formatter renders one entry's location and tags as a display string.
pub type Formatter = Box<dyn Fn(&str, i64, i64, i64, &Tags) -> String + Send + Sync>;

/// Maps action ids to their display formatters. Built once at construction;
/// actions without a registered formatter fall back to serializing the tag
/// map, and to the literal `"?"` if even that fails. The fallback chain is
/// total: `format` always returns a string.
#[derive(Default)]
pub struct FormatterTable {
    formatters: HashMap<String, Formatter>,
}

impl FormatterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a formatter for an action id, replacing any previous one.
    /// Intended to be called only while assembling the table at startup.
    pub fn register(&mut self, action: impl Into<String>, formatter: Formatter) {
        self.formatters.insert(action.into(), formatter);
    }

    /// Render one entry for display.
    pub fn format(&self, action: &str, world: &str, x: i64, y: i64, z: i64, tags: &Tags) -> String {
        if let Some(formatter) = self.formatters.get(action) {
            return formatter(world, x, y, z, tags);
        }
        serde_json::to_string(tags).unwrap_or_else(|_| "?".to_string())
    }
}

impl std::fmt::Debug for FormatterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("FormatterTable").field("actions", &actions).finish()
    }
}

/// Build a formatter from a template string. `{world}`, `{x}`, `{y}` and
/// `{z}` expand to the entry's location; any other `{name}` placeholder
/// expands to the value of the tag with that name, or is left as-is when
/// the entry carries no such tag.
pub fn template_formatter(template: impl Into<String>) -> Formatter {
    let template = template.into();
    Box::new(move |world, x, y, z, tags| {
        let mut out = template.clone();
        out = out.replace("{world}", world);
        out = out.replace("{x}", &x.to_string());
        out = out.replace("{y}", &y.to_string());
        out = out.replace("{z}", &z.to_string());
        for (name, value) in tags {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uses_registered_formatter() {
        let mut table = FormatterTable::new();
        table.register(
            "wal:block_entity_break",
            template_formatter("{player_gamertag} broke {block_entity} at {x},{y},{z} in {world}"),
        );

        let tags = Tags::from([
            ("player_gamertag".to_string(), "alex".to_string()),
            ("block_entity".to_string(), "Chest".to_string()),
        ]);
        let out = table.format("wal:block_entity_break", "world", 1, 64, -2, &tags);

        assert_eq!(out, "alex broke Chest at 1,64,-2 in world");
    }

    #[test]
    fn format_falls_back_to_tag_serialization() {
        let table = FormatterTable::new();
        let tags = Tags::from([("a".to_string(), "1".to_string())]);

        let out = table.format("unregistered", "world", 0, 0, 0, &tags);

        assert_eq!(out, r#"{"a":"1"}"#);
    }

    #[test]
    fn format_empty_tags_yields_empty_object() {
        let table = FormatterTable::new();
        let out = table.format("unregistered", "world", 0, 0, 0, &Tags::new());
        assert_eq!(out, "{}");
    }

    #[test]
    fn template_leaves_unmatched_placeholders() {
        let formatter = template_formatter("{player_gamertag} opened {block_entity}");
        let tags = Tags::from([("player_gamertag".to_string(), "steve".to_string())]);

        let out = formatter("world", 0, 0, 0, &tags);

        assert_eq!(out, "steve opened {block_entity}");
    }
}
