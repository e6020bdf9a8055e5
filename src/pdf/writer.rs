//! Page dictionary access and the operators written for replacement text.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::content::{PageBox, number};
use crate::fonts::FontId;
use crate::geometry::Rgb;

/// A4 portrait, used when a page carries no usable MediaBox.
pub(crate) const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 595.0, 842.0];

const MAX_TREE_DEPTH: usize = 32;

/// Name of the page resource that refers to `font`.
pub(crate) fn font_resource_name(font: FontId) -> String {
    format!("TR{}", font.as_str().replace('-', ""))
}

pub(crate) fn font_dictionary(font: FontId) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

/// Looks `key` up on the page, then on its ancestors in the page tree.
pub(crate) fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let values: Vec<f32> = inherited(doc, page_id, b"MediaBox")
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| number(resolve(doc, item)))
                .collect()
        })
        .unwrap_or_default();
    match values.as_slice() {
        [llx, lly, urx, ury] if (urx - llx).abs() > 0.0 && (ury - lly).abs() > 0.0 => {
            PageBox([llx.min(*urx), lly.min(*ury), llx.max(*urx), lly.max(*ury)])
        }
        _ => PageBox(DEFAULT_PAGE_BOX),
    }
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn fill_color(color: Rgb) -> Operation {
    Operation::new("rg", vec![real(color.r), real(color.g), real(color.b)])
}

/// Operators that draw one line of WinAnsi-encoded text with its baseline
/// at `(x, y)` in user space.
pub(crate) fn text_ops(
    resource: &str,
    size: f32,
    color: Rgb,
    (x, y): (f32, f32),
    bytes: Vec<u8>,
) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        fill_color(color),
        Operation::new(
            "Tf",
            vec![Object::Name(resource.as_bytes().to_vec()), real(size)],
        ),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![Object::String(bytes, StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

/// Operators that paint an opaque rectangle; `y` is the lower edge in user space.
pub(crate) fn rect_ops(x: f32, y: f32, width: f32, height: f32, color: Rgb) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        fill_color(color),
        Operation::new("re", vec![real(x), real(y), real(width), real(height)]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn add_content_stream(doc: &mut Document, ops: Vec<Operation>) -> lopdf::Result<ObjectId> {
    // leading newline: neighbouring streams may lack trailing whitespace
    let mut bytes = vec![b'\n'];
    bytes.extend(Content { operations: ops }.encode()?);
    Ok(doc.add_object(Stream::new(Dictionary::new(), bytes)))
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<&mut Dictionary> {
    doc.get_object_mut(page_id)?.as_dict_mut()
}

/// Replaces the page's content with a single stream holding `ops`.
pub(crate) fn replace_content(
    doc: &mut Document,
    page_id: ObjectId,
    ops: Vec<Operation>,
) -> lopdf::Result<()> {
    let stream_id = add_content_stream(doc, ops)?;
    page_dict_mut(doc, page_id)?.set("Contents", Object::Reference(stream_id));
    Ok(())
}

/// Flattens the page's `Contents` into a list of stream references.
fn content_references(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Some(contents) = doc
        .get_object(page_id)
        .ok()
        .and_then(|page| page.as_dict().ok())
        .and_then(|page| page.get(b"Contents").ok())
    else {
        return Vec::new();
    };
    match contents {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![contents.clone()],
        },
        Object::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

/// Decoded bytes of every content stream of the page, newline separated.
pub(crate) fn read_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let mut bytes = Vec::new();
    for reference in content_references(doc, page_id) {
        if let Ok(stream) = resolve(doc, &reference).as_stream() {
            let decoded = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            bytes.extend(decoded);
            bytes.push(b'\n');
        }
    }
    bytes
}

/// Appends `ops` after the existing content, isolating the existing graphics
/// state inside `q`/`Q` so leftover transforms do not move the new text.
pub(crate) fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    ops: Vec<Operation>,
) -> lopdf::Result<()> {
    let existing = content_references(doc, page_id);
    let mut tail = Vec::with_capacity(ops.len() + 1);
    if !existing.is_empty() {
        tail.push(Operation::new("Q", vec![]));
    }
    tail.extend(ops);
    let tail_id = add_content_stream(doc, tail)?;

    let contents = if existing.is_empty() {
        Object::Reference(tail_id)
    } else {
        let head_id = add_content_stream(doc, vec![Operation::new("q", vec![])])?;
        let mut streams = Vec::with_capacity(existing.len() + 2);
        streams.push(Object::Reference(head_id));
        streams.extend(existing);
        streams.push(Object::Reference(tail_id));
        Object::Array(streams)
    };
    page_dict_mut(doc, page_id)?.set("Contents", contents);
    Ok(())
}

/// Registers `fonts` in the page's own font resources, copying inherited
/// resources onto the page first.
pub(crate) fn register_fonts(
    doc: &mut Document,
    page_id: ObjectId,
    fonts: &BTreeMap<FontId, ObjectId>,
) -> lopdf::Result<()> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();
    let mut font_table = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();
    for (font, object_id) in fonts {
        let name = font_resource_name(*font);
        if !font_table.has(name.as_bytes()) {
            font_table.set(name, Object::Reference(*object_id));
        }
    }
    resources.set("Font", Object::Dictionary(font_table));
    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with_page(page: Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = page;
        page.set("Type", "Page");
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        (doc, page_id)
    }

    #[test]
    fn media_box_is_inherited_from_the_page_tree() {
        let (doc, page_id) = document_with_page(Dictionary::new());
        assert_eq!(page_box(&doc, page_id), PageBox([0.0, 0.0, 612.0, 792.0]));
    }

    #[test]
    fn appended_content_is_wrapped_after_existing_streams() {
        let (mut doc, page_id) = document_with_page(Dictionary::new());
        let original =
            doc.add_object(Stream::new(Dictionary::new(), b"1 0 0 1 50 50 cm".to_vec()));
        page_dict_mut(&mut doc, page_id)
            .unwrap()
            .set("Contents", Object::Reference(original));

        append_content(&mut doc, page_id, rect_ops(0.0, 0.0, 10.0, 10.0, Rgb::WHITE)).unwrap();

        let content = read_content(&doc, page_id);
        let ops = Content::decode(&content).unwrap().operations;
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators.first(), Some(&"q"));
        assert_eq!(&operators[1..4], &["cm", "Q", "q"]);
        assert!(operators.contains(&"re"));
    }

    #[test]
    fn fonts_are_registered_once_per_name() {
        let (mut doc, page_id) = document_with_page(Dictionary::new());
        let helv = doc.add_object(font_dictionary(FontId::Helv));
        register_fonts(&mut doc, page_id, &BTreeMap::from([(FontId::Helv, helv)])).unwrap();
        register_fonts(&mut doc, page_id, &BTreeMap::from([(FontId::Helv, (999, 0))])).unwrap();

        let page_fonts = doc.get_page_fonts(page_id).unwrap();
        let registered = page_fonts
            .get(font_resource_name(FontId::Helv).as_bytes())
            .expect("font registered");
        assert_eq!(
            registered.get(b"BaseFont").unwrap().as_name().unwrap(),
            b"Helvetica"
        );
    }

    #[test]
    fn resource_names_are_valid_pdf_names() {
        assert_eq!(font_resource_name(FontId::HelvBoldItalic), "TRhelvbi");
        let fonts = [FontId::Helv, FontId::CourBold, FontId::TimesBoldItalic];
        assert!(fonts
            .iter()
            .all(|font| font_resource_name(*font).chars().all(|ch| ch.is_ascii_alphanumeric())));
    }
}
