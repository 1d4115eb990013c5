use std::str::FromStr;

use indexmap::IndexMap;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Note color names mapped to the terminal color used to render them. The
/// order is the order of the color picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotePalette {
    colors: IndexMap<String, String>,
}

impl NotePalette {
    pub fn contains(&self, name: &str) -> bool {
        self.colors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.colors.keys().map(String::as_str)
    }

    /// Terminal color for a note color name; unknown names render as reset.
    pub fn color(&self, name: &str) -> Color {
        self.colors
            .get(name)
            .and_then(|raw| Color::from_str(raw).ok())
            .unwrap_or(Color::Reset)
    }

    /// The color after `current` in picker order, wrapping around.
    pub fn next_after(&self, current: &str) -> Option<&str> {
        let len = self.colors.len();
        if len == 0 {
            return None;
        }
        let next = match self.colors.get_index_of(current) {
            Some(idx) => (idx + 1) % len,
            None => 0,
        };
        self.colors.get_index(next).map(|(name, _)| name.as_str())
    }

    /// Drops entries whose color cannot be parsed, then fills in any missing
    /// built-in names.
    pub fn retain_valid(&mut self) {
        self.colors.retain(|name, raw| {
            let valid = Color::from_str(raw).is_ok();
            if !valid {
                tracing::warn!(%name, %raw, "ignoring unparsable palette color");
            }
            valid
        });
        for (name, raw) in builtin() {
            self.colors
                .entry(name.to_string())
                .or_insert_with(|| raw.to_string());
        }
    }
}

fn builtin() -> [(&'static str, &'static str); 6] {
    [
        ("blue", "#B3E5FC"),
        ("green", "#B9FBC0"),
        ("yellow", "#FFF9C4"),
        ("red", "#FFABAB"),
        ("gray", "#CFD8DC"),
        ("white", "white"),
    ]
}

impl Default for NotePalette {
    fn default() -> Self {
        let colors = builtin()
            .into_iter()
            .map(|(name, raw)| (name.to_string(), raw.to_string()))
            .collect();
        Self { colors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_colors_resolve() {
        let palette = NotePalette::default();
        assert_eq!(palette.color("blue"), Color::Rgb(0xB3, 0xE5, 0xFC));
        assert_eq!(palette.color("white"), Color::White);
        assert_eq!(palette.color("mauve"), Color::Reset);
    }

    #[test]
    fn picker_cycles_in_order() {
        let palette = NotePalette::default();
        assert_eq!(palette.next_after("blue"), Some("green"));
        assert_eq!(palette.next_after("white"), Some("blue"));
        assert_eq!(palette.next_after("unknown"), Some("blue"));
    }

    #[test]
    fn invalid_entries_are_replaced_by_builtins() {
        let mut palette: NotePalette =
            toml::from_str("blue = \"not a color\"\npink = \"#FFC0CB\"\n").expect("palette");
        palette.retain_valid();
        assert_eq!(palette.color("blue"), Color::Rgb(0xB3, 0xE5, 0xFC));
        assert_eq!(palette.color("pink"), Color::Rgb(0xFF, 0xC0, 0xCB));
        assert!(palette.contains("white"));
    }
}
