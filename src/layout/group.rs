use serde::Serialize;
use tracing::debug;

use crate::geometry::Rect;
use crate::page::TextFragment;

/// Horizontal gap (points) above which adjacent members are joined with a space.
const MIN_WORD_GAP: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentClass {
    /// Digits, punctuation and symbols only.
    Numeric,
    Prose,
    /// Whitespace only; never starts a new unit on its own.
    Blank,
}

pub fn classify(text: &str) -> ContentClass {
    if text.trim().is_empty() {
        ContentClass::Blank
    } else if text.chars().any(char::is_alphabetic) {
        ContentClass::Prose
    } else {
        ContentClass::Numeric
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupConfig {
    /// A gap wider than `gap_ratio * previous font size` splits a unit.
    pub gap_ratio: f32,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self { gap_ratio: 0.5 }
    }
}

/// Consecutive fragments of one line translated together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatableUnit {
    pub members: Vec<TextFragment>,
    pub rect: Rect,
    pub class: ContentClass,
}

impl TranslatableUnit {
    fn start(fragment: TextFragment) -> Self {
        Self {
            rect: fragment.bbox,
            class: classify(&fragment.text),
            members: vec![fragment],
        }
    }

    fn push(&mut self, fragment: TextFragment) {
        self.rect = self.rect.union(&fragment.bbox);
        if self.class == ContentClass::Blank {
            self.class = classify(&fragment.text);
        }
        self.members.push(fragment);
    }

    /// Member texts joined in reading order.
    pub fn text(&self) -> String {
        let mut joined = String::new();
        let mut previous: Option<&TextFragment> = None;
        for member in &self.members {
            if let Some(prev) = previous {
                let gap = member.bbox.x0 - prev.bbox.x1;
                let touching_space = prev.text.ends_with(char::is_whitespace)
                    || member.text.starts_with(char::is_whitespace);
                if gap >= MIN_WORD_GAP && !touching_space {
                    joined.push(' ');
                }
            }
            joined.push_str(&member.text);
            previous = Some(member);
        }
        joined
    }

    /// Member whose style the unit is redrawn with: the first non-blank one.
    pub fn representative(&self) -> &TextFragment {
        self.members
            .iter()
            .find(|member| !member.text.trim().is_empty())
            .unwrap_or(&self.members[0])
    }
}

/// Groups the fragments of one line into translatable units.
///
/// A new unit starts at a wide horizontal gap or where numeric content meets
/// prose. Fragments are expected in reading order.
pub fn group_line(fragments: &[TextFragment], config: &GroupConfig) -> Vec<TranslatableUnit> {
    let mut units: Vec<TranslatableUnit> = Vec::new();
    for fragment in fragments {
        if fragment.bbox.is_degenerate() || !fragment.size.is_finite() || fragment.size <= 0.0 {
            debug!(text = %fragment.text, "skipping degenerate fragment");
            continue;
        }
        let class = classify(&fragment.text);
        let split = match units.last() {
            None => true,
            Some(unit) => {
                let Some(prev) = unit.members.last() else {
                    continue;
                };
                let gap = fragment.bbox.x0 - prev.bbox.x1;
                let wide_gap = gap > config.gap_ratio * prev.size;
                let class_change = class != ContentClass::Blank
                    && unit.class != ContentClass::Blank
                    && class != unit.class;
                wide_gap || class_change
            }
        };
        if split {
            units.push(TranslatableUnit::start(fragment.clone()));
        } else if let Some(unit) = units.last_mut() {
            unit.push(fragment.clone());
        }
    }
    units
}
