//! Terminal-aware table utilities.

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

/// Create a table sized to the terminal, 120 columns when not on a TTY.
pub fn new_table() -> Table {
    let width = crossterm::terminal::size()
        .map(|(w, _)| w)
        .unwrap_or(120);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(width);
    table
}

/// Render a yes/no cell.
pub fn flag(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag() {
        assert_eq!(flag(true), "yes");
        assert_eq!(flag(false), "");
    }

    #[test]
    fn test_new_table_renders_rows() {
        let mut table = new_table();
        table.set_header(vec!["code", "type"]);
        table.add_row(vec!["website", "link"]);
        let rendered = table.to_string();
        assert!(rendered.contains("website"));
        assert!(rendered.contains("link"));
    }
}
