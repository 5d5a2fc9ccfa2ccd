// Certificate PDF rendering
// Fills the template's text fields and flattens them into the page content
// with the standard Helvetica font, so no font files are needed at runtime.
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::certificate::CertificateFields;
use crate::error::{CertError, CertResult};

pub const FIELD_NAME: &str = "NOMBRE_PARTICIPANTE";
pub const FIELD_DOCUMENT: &str = "DOCUMENTO";
pub const FIELD_ROLE: &str = "CALIDAD";
pub const FIELD_DATE: &str = "FECHA";

const FONT_KEY: &str = "CertHelv";
const DEFAULT_FONT_SIZE: f32 = 12.0;
// Average Helvetica advance as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.52;
const PADDING: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    path: PathBuf,
}

impl CertificateTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render a flattened certificate. The template file is only read.
    pub fn render(&self, fields: &CertificateFields) -> CertResult<Vec<u8>> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            CertError::Template(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        fill_and_flatten(
            &bytes,
            &[
                (FIELD_NAME, fields.name.as_str()),
                (FIELD_DOCUMENT, fields.document.as_str()),
                (FIELD_ROLE, fields.role.as_str()),
                (FIELD_DATE, fields.date.as_str()),
            ],
        )
    }
}

struct FormField {
    id: ObjectId,
    widgets: Vec<ObjectId>,
    font_size: Option<f32>,
    quadding: i64,
}

struct Placement {
    rect: [f32; 4],
    font_size: Option<f32>,
    quadding: i64,
    text: String,
}

/// Fill the named text fields with the given values and flatten the form.
/// Every name in `values` must exist in the form.
pub fn fill_and_flatten(template: &[u8], values: &[(&str, &str)]) -> CertResult<Vec<u8>> {
    let mut doc = Document::load_mem(template)?;

    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let acroform = match doc.get_object(root_id)?.as_dict()?.get(b"AcroForm") {
        Ok(obj) => resolve(&doc, obj)?.as_dict()?.clone(),
        Err(_) => return Err(CertError::Template("template has no form".to_string())),
    };
    let default_size = acroform
        .get(b"DA")
        .ok()
        .and_then(|o| o.as_str().ok())
        .and_then(font_size_from_da);
    let default_q = acroform.get(b"Q").ok().and_then(|o| o.as_i64().ok()).unwrap_or(0);

    let mut fields = HashMap::new();
    if let Ok(roots) = resolve(&doc, acroform.get(b"Fields")?)?.as_array() {
        for obj in roots {
            if let Ok(id) = obj.as_reference() {
                collect_fields(&doc, id, None, default_size, default_q, &mut fields)?;
            }
        }
    }

    for (name, _) in values {
        if !fields.contains_key(*name) {
            return Err(CertError::Template(format!("template is missing field {}", name)));
        }
    }

    let widget_pages = widget_pages(&doc)?;
    let mut per_page: BTreeMap<ObjectId, Vec<Placement>> = BTreeMap::new();
    for (name, value) in values {
        let field = &fields[*name];
        doc.get_object_mut(field.id)?
            .as_dict_mut()?
            .set("V", text_string(value));

        for widget_id in &field.widgets {
            let widget = doc.get_object(*widget_id)?.as_dict()?;
            let page_id = match widget_pages.get(widget_id) {
                Some(page_id) => *page_id,
                None => match widget.get(b"P").and_then(Object::as_reference) {
                    Ok(page_id) => page_id,
                    Err(_) => {
                        tracing::warn!(field = %name, "widget not attached to any page");
                        continue;
                    }
                },
            };
            let rect = read_rect(resolve(&doc, widget.get(b"Rect")?)?)?;
            per_page.entry(page_id).or_default().push(Placement {
                rect,
                font_size: widget
                    .get(b"DA")
                    .ok()
                    .and_then(|o| o.as_str().ok())
                    .and_then(font_size_from_da)
                    .or(field.font_size),
                quadding: widget
                    .get(b"Q")
                    .ok()
                    .and_then(|o| o.as_i64().ok())
                    .unwrap_or(field.quadding),
                text: value.to_string(),
            });
        }
    }

    if !per_page.is_empty() {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        for (page_id, placements) in per_page {
            register_font(&mut doc, page_id, font_id)?;
            let operations: Vec<Operation> =
                placements.iter().flat_map(text_operations).collect();
            let content = Content { operations };
            append_content(&mut doc, page_id, content.encode()?)?;
        }
    }

    let all_widgets: HashSet<ObjectId> = fields
        .values()
        .flat_map(|f| f.widgets.iter().copied())
        .collect();
    remove_widget_annotations(&mut doc, &all_widgets)?;
    doc.get_object_mut(root_id)?.as_dict_mut()?.remove(b"AcroForm");
    doc.prune_objects();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> lopdf::Result<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

fn collect_fields(
    doc: &Document,
    id: ObjectId,
    parent_name: Option<&str>,
    inherited_size: Option<f32>,
    inherited_q: i64,
    out: &mut HashMap<String, FormField>,
) -> CertResult<()> {
    let dict = doc.get_object(id)?.as_dict()?;
    let partial = dict.get(b"T").ok().and_then(|o| o.as_str().ok()).map(decode_text);
    let name = match (parent_name, partial) {
        (Some(parent), Some(p)) => Some(format!("{}.{}", parent, p)),
        (None, Some(p)) => Some(p),
        (parent, None) => parent.map(str::to_string),
    };
    let font_size = dict
        .get(b"DA")
        .ok()
        .and_then(|o| o.as_str().ok())
        .and_then(font_size_from_da)
        .or(inherited_size);
    let quadding = dict.get(b"Q").ok().and_then(|o| o.as_i64().ok()).unwrap_or(inherited_q);

    let kids: Vec<ObjectId> = match dict.get(b"Kids") {
        Ok(kids) => resolve(doc, kids)?
            .as_array()?
            .iter()
            .filter_map(|k| k.as_reference().ok())
            .collect(),
        Err(_) => Vec::new(),
    };
    let kids_are_fields = kids.iter().any(|kid| {
        doc.get_object(*kid)
            .and_then(Object::as_dict)
            .map(|d| d.has(b"T"))
            .unwrap_or(false)
    });

    if kids_are_fields {
        for kid in kids {
            collect_fields(doc, kid, name.as_deref(), font_size, quadding, out)?;
        }
    } else if let Some(name) = name {
        let widgets = if kids.is_empty() { vec![id] } else { kids };
        out.insert(
            name,
            FormField {
                id,
                widgets,
                font_size,
                quadding,
            },
        );
    }
    Ok(())
}

fn font_size_from_da(da: &[u8]) -> Option<f32> {
    static TF: OnceLock<Regex> = OnceLock::new();
    let re = TF.get_or_init(|| Regex::new(r"([0-9]*\.?[0-9]+)\s+Tf").expect("valid regex"));
    let da = String::from_utf8_lossy(da);
    re.captures(&da)
        .and_then(|c| c[1].parse::<f32>().ok())
        .filter(|size| *size > 0.0)
}

fn decode_text(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|b| *b as char).collect()
    }
}

fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        Object::string_literal(s)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// WinAnsi bytes for the standard Helvetica font; Latin-1 covers the
/// Spanish accents, anything else becomes '?'.
fn win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn read_rect(obj: &Object) -> CertResult<[f32; 4]> {
    let values: Vec<f32> = obj.as_array()?.iter().filter_map(number).collect();
    if values.len() != 4 {
        return Err(CertError::Template("widget has a malformed Rect".to_string()));
    }
    let (x1, x2) = (values[0].min(values[2]), values[0].max(values[2]));
    let (y1, y2) = (values[1].min(values[3]), values[1].max(values[3]));
    Ok([x1, y1, x2, y2])
}

fn text_operations(p: &Placement) -> Vec<Operation> {
    let [x1, y1, x2, y2] = p.rect;
    let (width, height) = (x2 - x1, y2 - y1);
    let glyphs = p.text.chars().count().max(1) as f32;

    let mut size = p
        .font_size
        .unwrap_or_else(|| (height * 0.7).min(DEFAULT_FONT_SIZE));
    let available = (width - 2.0 * PADDING).max(1.0);
    if glyphs * size * AVG_GLYPH_WIDTH > available {
        size = available / (glyphs * AVG_GLYPH_WIDTH);
    }
    let text_width = glyphs * size * AVG_GLYPH_WIDTH;

    let x = match p.quadding {
        1 => x1 + (width - text_width) / 2.0,
        2 => x2 - PADDING - text_width,
        _ => x1 + PADDING,
    };
    let y = y1 + (height - size) / 2.0 + size * 0.22;

    vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_KEY.as_bytes().to_vec()), Object::Real(size.into())]),
        Operation::new("Td", vec![Object::Real(x.into()), Object::Real(y.into())]),
        Operation::new("Tj", vec![Object::String(win_ansi(&p.text), StringFormat::Literal)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Map every annotation referenced from a page's /Annots to that page.
fn widget_pages(doc: &Document) -> CertResult<HashMap<ObjectId, ObjectId>> {
    let mut map = HashMap::new();
    for page_id in doc.get_pages().into_values() {
        let page = doc.get_object(page_id)?.as_dict()?;
        if let Ok(annots) = page.get(b"Annots") {
            if let Ok(annots) = resolve(doc, annots)?.as_array() {
                for annot in annots.iter().filter_map(|a| a.as_reference().ok()) {
                    map.insert(annot, page_id);
                }
            }
        }
    }
    Ok(map)
}

fn inherited_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = doc.get_object(page_id).and_then(Object::as_dict).ok();
    while let Some(dict) = current {
        if let Ok(res) = dict.get(b"Resources") {
            if let Ok(res) = resolve(doc, res).and_then(Object::as_dict) {
                return res.clone();
            }
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_object(id))
            .and_then(Object::as_dict)
            .ok();
    }
    Dictionary::new()
}

fn page_resources_mut(doc: &mut Document, page_id: ObjectId) -> CertResult<&mut Dictionary> {
    let existing = doc
        .get_object(page_id)?
        .as_dict()?
        .get(b"Resources")
        .ok()
        .cloned();
    match existing {
        Some(Object::Reference(id)) => Ok(doc.get_object_mut(id)?.as_dict_mut()?),
        Some(Object::Dictionary(_)) => Ok(doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .get_mut(b"Resources")?
            .as_dict_mut()?),
        _ => {
            let inherited = inherited_resources(doc, page_id);
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Resources", inherited);
            Ok(page.get_mut(b"Resources")?.as_dict_mut()?)
        }
    }
}

fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> CertResult<()> {
    let resources = page_resources_mut(doc, page_id)?;
    let fonts = resources.get(b"Font").ok().cloned();
    match fonts {
        Some(Object::Reference(id)) => {
            doc.get_object_mut(id)?
                .as_dict_mut()?
                .set(FONT_KEY, Object::Reference(font_id));
        }
        Some(Object::Dictionary(_)) => {
            resources
                .get_mut(b"Font")?
                .as_dict_mut()?
                .set(FONT_KEY, Object::Reference(font_id));
        }
        _ => {
            resources.set("Font", dictionary! { FONT_KEY => Object::Reference(font_id) });
        }
    }
    Ok(())
}

/// Append a content stream, isolating the existing page content in its own
/// graphics state so our text is drawn in default user space.
fn append_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> CertResult<()> {
    let mut overlay = b"Q\n".to_vec();
    overlay.extend_from_slice(&content);
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    let existing = doc
        .get_object(page_id)?
        .as_dict()?
        .get(b"Contents")
        .ok()
        .cloned();
    let contents: Vec<Object> = match existing {
        Some(Object::Reference(id)) => vec![open_id.into(), id.into(), overlay_id.into()],
        Some(Object::Array(existing)) => {
            let mut all: Vec<Object> = Vec::with_capacity(existing.len() + 2);
            all.push(open_id.into());
            all.extend(existing);
            all.push(overlay_id.into());
            all
        }
        _ => vec![overlay_id.into()],
    };
    // A lone overlay must not start with an unmatched Q.
    if contents.len() == 1 {
        doc.get_object_mut(overlay_id)?.as_stream_mut()?.set_content(content);
    }
    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}

fn remove_widget_annotations(doc: &mut Document, widgets: &HashSet<ObjectId>) -> CertResult<()> {
    let keep = |obj: &Object| obj.as_reference().map_or(true, |id| !widgets.contains(&id));
    for page_id in doc.get_pages().into_values() {
        let annots = doc.get_object(page_id)?.as_dict()?.get(b"Annots").ok().cloned();
        match annots {
            Some(Object::Reference(id)) => {
                if let Ok(array) = doc.get_object_mut(id)?.as_array_mut() {
                    array.retain(keep);
                }
            }
            Some(Object::Array(mut array)) => {
                array.retain(keep);
                let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
                if array.is_empty() {
                    page.remove(b"Annots");
                } else {
                    page.set("Annots", array);
                }
            }
            _ => {}
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixture::*;
    use super::*;

    fn fields() -> CertificateFields {
        CertificateFields {
            name: "ANA PEREZ".into(),
            document: "Citizenship ID Número 12345".into(),
            role: "Speaker ROBOTICS".into(),
            date: "Se expide a los (7) días del mes de noviembre de 2024".into(),
        }
    }

    fn page_text(pdf: &[u8]) -> Vec<u8> {
        let doc = Document::load_mem(pdf).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        doc.get_page_content(page_id).unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn render_fills_and_flattens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.pdf");
        std::fs::write(&path, certificate_pdf()).unwrap();

        let pdf = CertificateTemplate::new(&path).render(&fields()).unwrap();

        let doc = Document::load_mem(&pdf).unwrap();
        let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        assert!(!doc.get_object(root).unwrap().as_dict().unwrap().has(b"AcroForm"));
        let page_id = *doc.get_pages().values().next().unwrap();
        assert!(!doc.get_object(page_id).unwrap().as_dict().unwrap().has(b"Annots"));

        let text = page_text(&pdf);
        assert!(contains(&text, b"CERTIFICADO"));
        assert!(contains(&text, b"ANA PEREZ"));
        assert!(contains(&text, b"Speaker ROBOTICS"));
        assert!(contains(&text, b"N\xfamero 12345"));
        assert!(contains(&text, b"d\xedas del mes de noviembre de 2024"));
    }

    #[test]
    fn render_leaves_template_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.pdf");
        let original = certificate_pdf();
        std::fs::write(&path, &original).unwrap();

        let template = CertificateTemplate::new(&path);
        let first = template.render(&fields()).unwrap();
        let second = template.render(&fields()).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), original);
        assert!(first.starts_with(b"%PDF"));
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn missing_template_is_template_error() {
        let err = CertificateTemplate::new("/nonexistent/template.pdf")
            .render(&fields())
            .unwrap_err();
        assert!(matches!(err, CertError::Template(_)));
    }

    #[test]
    fn garbage_template_is_template_error() {
        let err = fill_and_flatten(b"not a pdf", &[(FIELD_NAME, "x")]).unwrap_err();
        assert!(matches!(err, CertError::Template(_)));
    }

    #[test]
    fn missing_field_is_template_error() {
        let pdf = form_pdf(&[FIELD_NAME, FIELD_DOCUMENT, FIELD_ROLE]);
        let err = fill_and_flatten(&pdf, &[(FIELD_NAME, "A"), (FIELD_DATE, "B")]).unwrap_err();
        match err {
            CertError::Template(msg) => assert!(msg.contains(FIELD_DATE), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn da_font_size_parsing() {
        assert_eq!(font_size_from_da(b"/Helv 14 Tf 0 g"), Some(14.0));
        assert_eq!(font_size_from_da(b"/Helv 9.5 Tf"), Some(9.5));
        assert_eq!(font_size_from_da(b"/Helv 0 Tf 0 g"), None);
        assert_eq!(font_size_from_da(b"0 g"), None);
    }

    #[test]
    fn win_ansi_keeps_spanish_accents() {
        assert_eq!(win_ansi("Número"), b"N\xfamero".to_vec());
        assert_eq!(win_ansi("PÉREZ Ñ"), b"P\xc9REZ \xd1".to_vec());
        assert_eq!(win_ansi("→"), b"?".to_vec());
    }

    #[test]
    fn text_string_uses_utf16_for_non_ascii() {
        match text_string("ABC") {
            Object::String(bytes, StringFormat::Literal) => assert_eq!(bytes, b"ABC".to_vec()),
            other => panic!("unexpected object: {other:?}"),
        }
        match text_string("Ñ") {
            Object::String(bytes, _) => assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xD1]),
            other => panic!("unexpected object: {other:?}"),
        }
    }
}
