//! Minimal xlsx package editing: template copy with image stripping, and
//! picture insertion anchored to cell ranges.
//!
//! An xlsx file is a zip of XML parts. Only the parts touched here are
//! rewritten; every other part is carried over unchanged. All functions are
//! blocking and meant to run under `spawn_blocking`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::layout::CellRange;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing part {0}")]
    MissingPart(String),

    #[error("part {0} is not UTF-8")]
    Encoding(String),

    #[error("worksheet '{0}' not found")]
    SheetNotFound(String),

    #[error("unexpected XML in {0}")]
    InvalidXml(String),
}

type Result<T> = std::result::Result<T, WorkbookError>;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const DRAWING_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const DRAWING_CT: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

const EMPTY_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
     <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"></Relationships>";

static DRAWING_ELEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<drawing\b[^>]*/>").expect("static regex"));
static RELATIONSHIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<Relationship\b[^>]*/>").expect("static regex"));
static OVERRIDE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<Override\b[^>]*/>").expect("static regex"));
static DEFAULT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<Default\b[^>]*/>").expect("static regex"));
static SHEET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<sheet\b[^>]*/>").expect("static regex"));
static REL_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bId="rId(\d+)""#).expect("static regex"));
static CNVPR_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<xdr:cNvPr\b[^>]*\bid="(\d+)""#).expect("static regex"));
/// Worksheet children that must come after `<drawing>`.
static AFTER_DRAWING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(legacyDrawing|legacyDrawingHF|drawingHF|picture|oleObjects|controls|webPublishItems|tableParts|extLst)\b|</worksheet>")
        .expect("static regex")
});

fn attr(tag: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"(?:^|\s){}="([^"]*)""#, regex::escape(name));
    Regex::new(&pattern).ok()?.captures(tag).map(|c| c[1].to_owned())
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_owned();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn next_rel_id(rels: &str) -> String {
    let max = REL_ID
        .captures_iter(rels)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

fn add_relationship(rels: &str, id: &str, rel_type: &str, target: &str, part: &str) -> Result<String> {
    let entry = format!(r#"<Relationship Id="{id}" Type="{rel_type}" Target="{target}"/>"#);
    let pos = rels
        .rfind("</Relationships>")
        .ok_or_else(|| WorkbookError::InvalidXml(part.to_owned()))?;
    Ok(format!("{}{}{}", &rels[..pos], entry, &rels[pos..]))
}

/// The decompressed parts of an xlsx package, in archive order.
struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    fn read(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push((entry.name().to_owned(), data));
        }
        Ok(Self { parts })
    }

    fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    fn text(&self, name: &str) -> Result<String> {
        let (_, data) = self
            .parts
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| WorkbookError::MissingPart(name.to_owned()))?;
        String::from_utf8(data.clone()).map_err(|_| WorkbookError::Encoding(name.to_owned()))
    }

    fn put(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_owned(), data)),
        }
    }

    fn edit_text(&mut self, name: &str, f: impl FnOnce(String) -> Result<String>) -> Result<()> {
        let updated = f(self.text(name)?)?;
        self.put(name, updated.into_bytes());
        Ok(())
    }

    /// Write to a uniquely named sibling temp file, then rename over `dest`.
    fn write_atomic(&self, dest: &Path) -> Result<()> {
        let tmp: PathBuf = dest.with_extension(format!("{}.part", uuid::Uuid::new_v4().simple()));
        {
            let file = std::fs::File::create(&tmp)?;
            let mut zip = ZipWriter::new(file);
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, data) in &self.parts {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(data)?;
            }
            zip.finish()?;
        }
        if let Err(e) = std::fs::rename(&tmp, dest) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// DrawingML parts (`drawingN.xml` and their rels). Legacy VML drawings,
/// which hold cell comments, live in the same folder and are kept.
fn is_drawingml_part(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("xl/drawings/") else {
        return false;
    };
    let file = rest.strip_prefix("_rels/").unwrap_or(rest);
    file.starts_with("drawing")
}

/// Media parts still referenced from the kept VML drawings.
fn media_used_by_vml(pkg: &Package) -> Vec<String> {
    pkg.parts
        .iter()
        .filter(|(name, _)| name.starts_with("xl/drawings/_rels/") && !is_drawingml_part(name))
        .filter_map(|(name, data)| std::str::from_utf8(data).ok().map(|text| (name, text)))
        .flat_map(|(name, text)| {
            let owner = name.replacen("_rels/", "", 1);
            let owner = owner.trim_end_matches(".rels").to_owned();
            RELATIONSHIP
                .find_iter(text)
                .filter_map(|m| attr(m.as_str(), "Target"))
                .map(move |target| resolve_target(parent_dir(&owner), &target))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Copy `template` to `dest`, dropping every embedded picture and its
/// DrawingML drawing. Comments and other VML content survive.
pub fn copy_template(template: &Path, dest: &Path) -> Result<()> {
    let mut pkg = Package::read(template)?;
    let before = pkg.parts.len();
    let vml_media = media_used_by_vml(&pkg);
    pkg.parts.retain(|(name, _)| {
        let stale_media = name.starts_with("xl/media/") && !vml_media.contains(name);
        !stale_media && !is_drawingml_part(name)
    });
    let dropped = before - pkg.parts.len();

    for (name, data) in pkg.parts.iter_mut() {
        let is_sheet = name.starts_with("xl/worksheets/") && name.ends_with(".xml") && !name.contains("/_rels/");
        let is_sheet_rels = name.starts_with("xl/worksheets/_rels/");
        if !(is_sheet || is_sheet_rels || name == "[Content_Types].xml") {
            continue;
        }
        let text = String::from_utf8(std::mem::take(data)).map_err(|_| WorkbookError::Encoding(name.clone()))?;
        let cleaned = if is_sheet {
            DRAWING_ELEM.replace_all(&text, "").into_owned()
        } else if is_sheet_rels {
            RELATIONSHIP
                .replace_all(&text, |caps: &regex::Captures| {
                    let tag = &caps[0];
                    let rel_type = attr(tag, "Type").unwrap_or_default();
                    if rel_type == DRAWING_REL || rel_type == IMAGE_REL {
                        String::new()
                    } else {
                        tag.to_owned()
                    }
                })
                .into_owned()
        } else {
            OVERRIDE
                .replace_all(&text, |caps: &regex::Captures| {
                    let tag = &caps[0];
                    let part = attr(tag, "PartName").unwrap_or_default();
                    let part = part.trim_start_matches('/');
                    if is_drawingml_part(part) || (part.starts_with("xl/media/") && !vml_media.iter().any(|m| m == part)) {
                        String::new()
                    } else {
                        tag.to_owned()
                    }
                })
                .into_owned()
        };
        *data = cleaned.into_bytes();
    }

    pkg.write_atomic(dest)?;
    tracing::debug!(template = %template.display(), dest = %dest.display(), dropped, "template copied");
    Ok(())
}

/// Image format accepted for embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureFormat {
    Png,
    Jpeg,
}

impl PictureFormat {
    fn extension(self) -> &'static str {
        match self {
            PictureFormat::Png => "png",
            PictureFormat::Jpeg => "jpeg",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            PictureFormat::Png => "image/png",
            PictureFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Picture {
    /// Worksheet name; `None` targets the first sheet.
    pub sheet: Option<String>,
    pub range: CellRange,
    pub name: String,
    pub format: PictureFormat,
    pub data: Vec<u8>,
}

/// Path of the worksheet part for `sheet` (first sheet when `None`).
fn sheet_part(pkg: &Package, sheet: Option<&str>) -> Result<String> {
    let workbook = pkg.text("xl/workbook.xml")?;
    let wanted = || WorkbookError::SheetNotFound(sheet.unwrap_or("<first>").to_owned());
    let tag = SHEET
        .find_iter(&workbook)
        .map(|m| m.as_str())
        .find(|tag| match sheet {
            None => true,
            Some(name) => attr(tag, "name").as_deref() == Some(name),
        })
        .ok_or_else(wanted)?;
    let rid = attr(tag, "r:id").ok_or_else(|| WorkbookError::InvalidXml("xl/workbook.xml".into()))?;

    let rels = pkg.text("xl/_rels/workbook.xml.rels")?;
    let target = RELATIONSHIP
        .find_iter(&rels)
        .map(|m| m.as_str())
        .find(|rel| attr(rel, "Id").as_deref() == Some(rid.as_str()))
        .and_then(|rel| attr(rel, "Target"))
        .ok_or_else(wanted)?;
    Ok(resolve_target("xl", &target))
}

/// Find the drawing linked from `sheet`, creating and linking one if needed.
fn ensure_drawing(pkg: &mut Package, sheet: &str) -> Result<String> {
    let sheet_rels = rels_path(sheet);
    let rels_text = if pkg.contains(&sheet_rels) { pkg.text(&sheet_rels)? } else { EMPTY_RELS.to_owned() };

    let existing = RELATIONSHIP
        .find_iter(&rels_text)
        .map(|m| m.as_str())
        .find(|rel| attr(rel, "Type").as_deref() == Some(DRAWING_REL))
        .and_then(|rel| attr(rel, "Target"))
        .map(|target| resolve_target(parent_dir(sheet), &target));

    if let Some(drawing) = existing {
        if !pkg.contains(&drawing) {
            pkg.put(&drawing, empty_drawing().into_bytes());
        }
        return Ok(drawing);
    }

    let n = (1..).find(|n| !pkg.contains(&format!("xl/drawings/drawing{n}.xml"))).unwrap_or(1);
    let drawing = format!("xl/drawings/drawing{n}.xml");
    pkg.put(&drawing, empty_drawing().into_bytes());

    let rid = next_rel_id(&rels_text);
    let rels_text = add_relationship(&rels_text, &rid, DRAWING_REL, &format!("../drawings/drawing{n}.xml"), &sheet_rels)?;
    pkg.put(&sheet_rels, rels_text.into_bytes());

    pkg.edit_text(sheet, |xml| {
        let xml = if xml.contains("xmlns:r=") {
            xml
        } else {
            xml.replacen("<worksheet ", &format!("<worksheet xmlns:r=\"{REL_NS}\" "), 1)
        };
        let pos = AFTER_DRAWING
            .find(&xml)
            .map(|m| m.start())
            .ok_or_else(|| WorkbookError::InvalidXml(sheet.to_owned()))?;
        Ok(format!("{}<drawing r:id=\"{rid}\"/>{}", &xml[..pos], &xml[pos..]))
    })?;

    pkg.edit_text("[Content_Types].xml", |xml| {
        let entry = format!(r#"<Override PartName="/{drawing}" ContentType="{DRAWING_CT}"/>"#);
        let pos = xml.rfind("</Types>").ok_or_else(|| WorkbookError::InvalidXml("[Content_Types].xml".into()))?;
        Ok(format!("{}{}{}", &xml[..pos], entry, &xml[pos..]))
    })?;
    Ok(drawing)
}

fn empty_drawing() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <xdr:wsDr xmlns:xdr=\"{XDR_NS}\" xmlns:a=\"{A_NS}\" xmlns:r=\"{REL_NS}\"></xdr:wsDr>"
    )
}

fn anchor_xml(range: &CellRange, shape_id: u32, name: &str, rid: &str) -> String {
    let name = name.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;");
    format!(
        "<xdr:twoCellAnchor editAs=\"oneCell\" xmlns:a=\"{A_NS}\" xmlns:r=\"{REL_NS}\">\
         <xdr:from><xdr:col>{fc}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{fr}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>\
         <xdr:to><xdr:col>{tc}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{tr}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>\
         <xdr:pic><xdr:nvPicPr><xdr:cNvPr id=\"{shape_id}\" name=\"{name}\"/>\
         <xdr:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></xdr:cNvPicPr></xdr:nvPicPr>\
         <xdr:blipFill><a:blip r:embed=\"{rid}\"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>\
         <xdr:spPr><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></xdr:spPr></xdr:pic>\
         <xdr:clientData/></xdr:twoCellAnchor>",
        fc = range.from_col,
        fr = range.from_row,
        tc = range.to_col + 1,
        tr = range.to_row + 1,
    )
}

fn ensure_default_type(xml: String, format: PictureFormat) -> String {
    let ext = format.extension();
    let present = DEFAULT
        .find_iter(&xml)
        .any(|m| attr(m.as_str(), "Extension").is_some_and(|e| e.eq_ignore_ascii_case(ext)));
    if present {
        return xml;
    }
    let entry = format!(r#"<Default Extension="{ext}" ContentType="{}"/>"#, format.content_type());
    // Defaults may go anywhere among the children of <Types>.
    match xml.find("<Override").or_else(|| xml.rfind("</Types>")) {
        Some(pos) => format!("{}{}{}", &xml[..pos], entry, &xml[pos..]),
        None => xml,
    }
}

/// Embed `pictures` into the workbook at `path`, in place. Returns the
/// number of pictures written.
pub fn insert_pictures(path: &Path, pictures: &[Picture]) -> Result<usize> {
    if pictures.is_empty() {
        return Ok(0);
    }
    let mut pkg = Package::read(path)?;

    for picture in pictures {
        let sheet = sheet_part(&pkg, picture.sheet.as_deref())?;
        let drawing = ensure_drawing(&mut pkg, &sheet)?;
        let drawing_rels = rels_path(&drawing);

        let ext = picture.format.extension();
        let k = (1..).find(|k| !pkg.contains(&format!("xl/media/image{k}.{ext}"))).unwrap_or(1);
        let media = format!("image{k}.{ext}");
        pkg.put(&format!("xl/media/{media}"), picture.data.clone());

        let rels_text = if pkg.contains(&drawing_rels) { pkg.text(&drawing_rels)? } else { EMPTY_RELS.to_owned() };
        let rid = next_rel_id(&rels_text);
        let rels_text = add_relationship(&rels_text, &rid, IMAGE_REL, &format!("../media/{media}"), &drawing_rels)?;
        pkg.put(&drawing_rels, rels_text.into_bytes());

        pkg.edit_text(&drawing, |xml| {
            let shape_id = CNVPR_ID
                .captures_iter(&xml)
                .filter_map(|c| c[1].parse::<u32>().ok())
                .max()
                .unwrap_or(0)
                + 1;
            let pos = xml.rfind("</xdr:wsDr>").ok_or_else(|| WorkbookError::InvalidXml(drawing.clone()))?;
            let anchor = anchor_xml(&picture.range, shape_id, &picture.name, &rid);
            Ok(format!("{}{}{}", &xml[..pos], anchor, &xml[pos..]))
        })?;

        pkg.edit_text("[Content_Types].xml", |xml| Ok(ensure_default_type(xml, picture.format)))?;
    }

    pkg.write_atomic(path)?;
    Ok(pictures.len())
}

/// Part names inside an xlsx; used by tests and diagnostics.
pub fn part_names(path: &Path) -> Result<Vec<String>> {
    Ok(Package::read(path)?.parts.into_iter().map(|(n, _)| n).collect())
}

/// UTF-8 content of a single part.
pub fn part_text(path: &Path, part: &str) -> Result<String> {
    Package::read(path)?.text(part)
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn target_resolution() {
        assert_eq!(resolve_target("xl/worksheets", "../drawings/drawing1.xml"), "xl/drawings/drawing1.xml");
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(rels_path("xl/drawings/drawing1.xml"), "xl/drawings/_rels/drawing1.xml.rels");
    }

    #[test]
    fn copy_strips_pictures() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.xlsx");
        let out = dir.path().join("out.xlsx");
        fixtures::template(&template);

        copy_template(&template, &out).unwrap();
        let names = part_names(&out).unwrap();
        assert!(!names.iter().any(|n| n.starts_with("xl/media/") || n.starts_with("xl/drawings/")));
        assert!(!part_text(&out, "xl/worksheets/sheet1.xml").unwrap().contains("<drawing"));
        assert!(!part_text(&out, "xl/worksheets/_rels/sheet1.xml.rels").unwrap().contains("drawing"));
        assert!(!part_text(&out, "[Content_Types].xml").unwrap().contains("/xl/drawings/"));
    }

    #[test]
    fn copy_keeps_comment_drawings() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.xlsx");
        let out = dir.path().join("out.xlsx");
        fixtures::commented_template(&template);

        copy_template(&template, &out).unwrap();
        let names = part_names(&out).unwrap();
        assert!(names.contains(&"xl/drawings/vmlDrawing1.vml".to_owned()));
        assert!(names.contains(&"xl/comments1.xml".to_owned()));
        assert!(!names.contains(&"xl/drawings/drawing1.xml".to_owned()));
        assert!(!names.contains(&"xl/drawings/_rels/drawing1.xml.rels".to_owned()));
        assert!(!names.contains(&"xl/media/image1.png".to_owned()));

        let sheet = part_text(&out, "xl/worksheets/sheet1.xml").unwrap();
        assert!(sheet.contains(r#"<legacyDrawing r:id="rId2"/>"#));
        assert!(!sheet.contains("<drawing "));
        let rels = part_text(&out, "xl/worksheets/_rels/sheet1.xml.rels").unwrap();
        assert!(rels.contains("../drawings/vmlDrawing1.vml"));
        assert!(!rels.contains("../drawings/drawing1.xml"));
        let types = part_text(&out, "[Content_Types].xml").unwrap();
        assert!(types.contains(r#"Extension="vml""#));
        assert!(!types.contains("/xl/drawings/drawing1.xml"));

        // New pictures still get a fresh DrawingML part next to the VML one.
        insert_pictures(
            &out,
            &[Picture {
                sheet: None,
                range: "B2:C3".parse().unwrap(),
                name: "foto".into(),
                format: PictureFormat::Png,
                data: vec![0x89, b'P', b'N', b'G'],
            }],
        )
        .unwrap();
        let sheet = part_text(&out, "xl/worksheets/sheet1.xml").unwrap();
        assert!(sheet.contains(r#"<drawing r:id="rId4"/><legacyDrawing r:id="rId2"/>"#));
        assert!(part_names(&out).unwrap().contains(&"xl/drawings/vmlDrawing1.vml".to_owned()));
    }

    #[test]
    fn rewrites_leave_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.xlsx");
        let out = dir.path().join("out.xlsx");
        fixtures::template(&template);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| copy_template(&template, &out).unwrap());
            }
        });
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
        assert!(part_names(&out).unwrap().contains(&"xl/workbook.xml".to_owned()));
    }

    #[test]
    fn inserts_pictures_into_new_and_existing_drawings() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.xlsx");
        let out = dir.path().join("out.xlsx");
        fixtures::template(&template);
        copy_template(&template, &out).unwrap();

        let pic = |sheet: Option<&str>, range: &str| Picture {
            sheet: sheet.map(str::to_owned),
            range: range.parse().unwrap(),
            name: "foto".into(),
            format: PictureFormat::Jpeg,
            data: vec![0xff, 0xd8, 0xff],
        };
        let written = insert_pictures(&out, &[pic(None, "B10:F25"), pic(Some("Foto"), "A1:C3")]).unwrap();
        assert_eq!(written, 2);

        let names = part_names(&out).unwrap();
        assert!(names.contains(&"xl/media/image1.jpeg".to_owned()));
        assert!(names.contains(&"xl/media/image2.jpeg".to_owned()));

        let sheet2 = part_text(&out, "xl/worksheets/sheet2.xml").unwrap();
        assert!(sheet2.contains("<drawing r:id=\"rId1\"/></worksheet>"));
        assert!(sheet2.contains("xmlns:r="));

        let d1 = part_text(&out, "xl/drawings/drawing1.xml").unwrap();
        assert!(d1.contains("<xdr:col>1</xdr:col>"));
        assert!(d1.contains("<xdr:row>25</xdr:row>"));
        let types = part_text(&out, "[Content_Types].xml").unwrap();
        assert!(types.contains(r#"Extension="jpeg""#));
        assert_eq!(types.matches("/xl/drawings/drawing").count(), 2);

        // A second pass appends to the same drawing.
        insert_pictures(&out, &[pic(None, "H10:L25")]).unwrap();
        let d1 = part_text(&out, "xl/drawings/drawing1.xml").unwrap();
        assert_eq!(d1.matches("<xdr:twoCellAnchor").count(), 2);
        assert!(d1.contains(r#"id="2""#));
    }

    #[test]
    fn unknown_sheet_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.xlsx");
        fixtures::template(&path);
        let err = insert_pictures(
            &path,
            &[Picture {
                sheet: Some("Tidak Ada".into()),
                range: "A1:A1".parse().unwrap(),
                name: "x".into(),
                format: PictureFormat::Png,
                data: vec![],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, WorkbookError::SheetNotFound(_)));
    }
}
