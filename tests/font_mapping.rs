use pdf_reflow_translator::fonts::FontMapper;

const SOURCE_FONTS: &[&str] = &[
    "Helvetica",
    "Arial-BoldMT",
    "ABCDEF+Calibri-Italic",
    "TimesNewRomanPS-BoldItalicMT",
    "Times-Roman",
    "Courier New",
    "CourierNew-Bold",
    "DejaVuSansMono",
    "Lucida Console",
    "NotoSerif-Regular",
    "PTSans-Oblique",
    "Georgia",
];

#[test]
fn font_mapping_table() {
    let sans = FontMapper::new(false);
    let serif = FontMapper::new(true);
    let table = SOURCE_FONTS
        .iter()
        .map(|name| format!("{} -> {} | {}", name, sans.map(name), serif.map(name)))
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(table, @r"
    Helvetica -> helv | helv
    Arial-BoldMT -> helv-b | helv-b
    ABCDEF+Calibri-Italic -> helv-i | helv-i
    TimesNewRomanPS-BoldItalicMT -> helv-bi | times-bi
    Times-Roman -> helv | times
    Courier New -> cour | cour
    CourierNew-Bold -> cour-b | cour-b
    DejaVuSansMono -> cour | cour
    Lucida Console -> cour | cour
    NotoSerif-Regular -> helv | times
    PTSans-Oblique -> helv-i | helv-i
    Georgia -> helv | helv
    ");
}
