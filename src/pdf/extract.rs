//! Page resources and the block/line/fragment tree built from a content scan.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::content::{FontResource, PageResources, ShowRecord, number};
use super::writer::{inherited, resolve, resolve_dict};
use crate::page::{DESCENT, TextBlock, TextFragment, TextLine};

/// Baselines closer than this (points) share a line.
const LINE_Y_TOLERANCE: f32 = 1.0;

/// A baseline step larger than this multiple of the font size starts a block.
const BLOCK_GAP_FACTOR: f32 = 1.4;

pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> PageResources<'_> {
    let mut resources = PageResources::default();
    if let Ok(fonts) = doc.get_page_fonts(page_id) {
        for (name, dict) in fonts {
            resources.fonts.insert(name, font_resource(doc, dict));
        }
    }

    let xobjects = inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dict(doc, obj))
        .and_then(|dict| dict.get(b"XObject").ok())
        .and_then(|obj| resolve_dict(doc, obj));
    if let Some(xobjects) = xobjects {
        for (name, obj) in xobjects.iter() {
            let is_image = resolve(doc, obj).as_stream().is_ok_and(|stream| {
                stream
                    .dict
                    .get(b"Subtype")
                    .and_then(Object::as_name)
                    .is_ok_and(|subtype| subtype == b"Image")
            });
            if is_image {
                resources.images.insert(name.clone());
            }
        }
    }
    resources
}

fn font_resource<'a>(doc: &'a Document, dict: &'a Dictionary) -> FontResource<'a> {
    let name_of = |key: &[u8]| {
        dict.get(key)
            .map(|obj| resolve(doc, obj))
            .and_then(Object::as_name)
            .ok()
    };
    let base_font = name_of(b"BaseFont")
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default();

    let encoding = match dict.get_font_encoding(doc) {
        Ok(encoding) => Some(encoding),
        Err(err) => {
            debug!(font = %base_font, %err, "no usable font encoding");
            None
        }
    };
    let first_char = dict
        .get(b"FirstChar")
        .ok()
        .and_then(|obj| number(resolve(doc, obj)))
        .unwrap_or(0.0)
        .max(0.0) as u32;
    let widths = dict
        .get(b"Widths")
        .map(|obj| resolve(doc, obj))
        .and_then(Object::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| number(resolve(doc, item)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();

    let two_byte = name_of(b"Subtype").is_some_and(|subtype| subtype == b"Type0");
    let descendant = two_byte
        .then(|| dict.get(b"DescendantFonts").ok())
        .flatten()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .and_then(|fonts| fonts.first())
        .and_then(|obj| resolve_dict(doc, obj));
    let (cid_widths, default_width) = match descendant {
        Some(cid_font) => cid_font_widths(doc, cid_font),
        None => (HashMap::new(), None),
    };

    FontResource {
        base_font,
        encoding,
        first_char,
        widths,
        two_byte,
        cid_widths,
        default_width,
    }
}

/// Glyph widths of a CIDFont: the `/W` array and the `/DW` default (1000).
///
/// `/W` mixes `c [w1 w2 ...]` runs and `c_first c_last w` ranges.
fn cid_font_widths(doc: &Document, cid_font: &Dictionary) -> (HashMap<u32, f32>, Option<f32>) {
    let default_width = cid_font
        .get(b"DW")
        .ok()
        .and_then(|obj| number(resolve(doc, obj)))
        .unwrap_or(1000.0);
    let items = cid_font
        .get(b"W")
        .map(|obj| resolve(doc, obj))
        .and_then(Object::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut widths = HashMap::new();
    let mut index = 0;
    while index < items.len() {
        let Some(first) = number(resolve(doc, &items[index])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match items.get(index + 1).map(|obj| resolve(doc, obj)) {
            Some(Object::Array(run)) => {
                for (offset, width) in run.iter().enumerate() {
                    if let Some(width) = number(resolve(doc, width)) {
                        widths.insert(first + offset as u32, width);
                    }
                }
                index += 2;
            }
            Some(last) => {
                let last = number(last).map(|value| value.max(0.0) as u32);
                let width = items.get(index + 2).and_then(|obj| number(resolve(doc, obj)));
                let (Some(last), Some(width)) = (last, width) else {
                    break;
                };
                for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                    widths.insert(cid, width);
                }
                index += 3;
            }
            None => break,
        }
    }
    (widths, Some(default_width))
}

pub(crate) fn fragment_from_show(show: ShowRecord) -> Option<TextFragment> {
    if show.text.is_empty() {
        return None;
    }
    if show.bbox.is_degenerate() || !show.size.is_finite() || show.size <= 0.0 {
        debug!(text = %show.text, "skipping fragment without a usable box");
        return None;
    }
    Some(TextFragment {
        text: show.text,
        bbox: show.bbox,
        font: show.font_name,
        size: show.size,
        color: show.color,
    })
}

fn baseline(fragment: &TextFragment) -> f32 {
    fragment.bbox.y1 - fragment.size * DESCENT
}

/// Groups fragments into lines by baseline, top to bottom, and lines into
/// blocks wherever the baseline step is large for the font size.
pub(crate) fn assemble_blocks(mut fragments: Vec<TextFragment>) -> Vec<TextBlock> {
    fragments.sort_by(|a, b| {
        baseline(a)
            .total_cmp(&baseline(b))
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<(f32, f32, TextLine)> = Vec::new();
    for fragment in fragments {
        let y = baseline(&fragment);
        match lines.last_mut() {
            Some((line_y, size, line)) if (y - *line_y).abs() <= LINE_Y_TOLERANCE => {
                *size = size.max(fragment.size);
                line.fragments.push(fragment);
            }
            _ => lines.push((
                y,
                fragment.size,
                TextLine {
                    fragments: vec![fragment],
                },
            )),
        }
    }

    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut previous: Option<(f32, f32)> = None;
    for (y, size, mut line) in lines {
        line.fragments.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        let starts_block = match previous {
            Some((previous_y, previous_size)) => {
                y - previous_y > previous_size * BLOCK_GAP_FACTOR
            }
            None => true,
        };
        match blocks.last_mut() {
            Some(block) if !starts_block => block.lines.push(line),
            _ => blocks.push(TextBlock { lines: vec![line] }),
        }
        previous = Some((y, size));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, Rgb};
    use crate::pdf::content::ShowKind;

    fn fragment(text: &str, x: f32, baseline: f32, size: f32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            bbox: Rect::new(x, baseline - size * 0.8, x + 20.0, baseline + size * DESCENT),
            font: "Helvetica".to_string(),
            size,
            color: Rgb::BLACK,
        }
    }

    #[test]
    fn fragments_on_one_baseline_form_a_line_in_x_order() {
        let blocks = assemble_blocks(vec![
            fragment("world", 60.0, 100.0, 10.0),
            fragment("Hello", 10.0, 100.4, 10.0),
        ]);
        assert_eq!(blocks.len(), 1);
        let texts: Vec<&str> = blocks[0].lines[0]
            .fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Hello", "world"]);
    }

    #[test]
    fn large_baseline_steps_start_new_blocks() {
        let blocks = assemble_blocks(vec![
            fragment("third", 10.0, 160.0, 10.0),
            fragment("first", 10.0, 100.0, 10.0),
            fragment("second", 10.0, 112.0, 10.0),
        ]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines.len(), 2);
        assert_eq!(blocks[0].lines[0].fragments[0].text, "first");
        assert_eq!(blocks[1].lines[0].fragments[0].text, "third");
    }

    #[test]
    fn empty_and_degenerate_shows_are_dropped() {
        let show = |text: &str, bbox: Rect| ShowRecord {
            op_index: 0,
            kind: ShowKind::Tj,
            text: text.to_string(),
            bbox,
            font_name: String::new(),
            size: 10.0,
            color: Rgb::BLACK,
            advance: 0.0,
            font_size: 10.0,
            horiz_scale: 1.0,
        };
        assert!(fragment_from_show(show("", Rect::new(0.0, 0.0, 5.0, 5.0))).is_none());
        assert!(fragment_from_show(show("x", Rect::new(5.0, 0.0, 5.0, 5.0))).is_none());
        assert!(fragment_from_show(show("x", Rect::new(0.0, 0.0, 5.0, 5.0))).is_some());
    }
}
