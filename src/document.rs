use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::DocumentError;

const PANDOC: &str = "pandoc";

const DOCUMENT_XML: &str = "word/document.xml";
const STYLES_XML: &str = "word/styles.xml";

const GRID_STYLE_NAME: &str = "TableGrid";

const GRID_STYLE: &str = "<w:style w:type=\"table\" w:styleId=\"TableGrid\">\
    <w:name w:val=\"Table Grid\"/>\
    <w:uiPriority w:val=\"59\"/>\
    <w:pPr><w:spacing w:after=\"0\" w:line=\"240\" w:lineRule=\"auto\"/></w:pPr>\
    <w:tblPr><w:tblBorders>\
    <w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
    <w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
    <w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
    <w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
    <w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
    <w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
    </w:tblBorders></w:tblPr>\
    </w:style>";

/// Convert LaTeX to a docx at `path` and give every table a grid style.
pub fn write_docx(
    latex: &str,
    path: &Path,
    reference_doc: Option<&Path>,
) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    convert(PANDOC, latex, path, reference_doc)?;
    apply_table_grid(path)
}

fn convert(
    program: &str,
    latex: &str,
    path: &Path,
    reference_doc: Option<&Path>,
) -> Result<(), DocumentError> {
    let mut cmd = Command::new(program);
    cmd.args(["--from", "latex", "--to", "docx", "--standalone"]);
    if let Some(reference) = reference_doc {
        cmd.arg(format!("--reference-doc={}", reference.display()));
    }
    cmd.arg("--output")
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    debug!(?cmd, "running pandoc");
    let mut child = cmd
        .spawn()
        .map_err(|source| DocumentError::Spawn { source })?;
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(latex.as_bytes()),
        None => Ok(()),
    };

    // A converter that exits early closes the pipe, its stderr says why.
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(DocumentError::Pandoc {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    written?;
    Ok(())
}

/// Rewrite a docx in place so every table uses the `TableGrid` style.
pub fn apply_table_grid(path: &Path) -> Result<(), DocumentError> {
    let updated_path = path.with_extension("updated");
    if let Err(error) = restyle(path, &updated_path) {
        let _ = fs::remove_file(&updated_path);
        return Err(error);
    }
    fs::rename(updated_path, path)?;
    Ok(())
}

fn restyle(path: &Path, updated_path: &Path) -> Result<(), DocumentError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut writer = ZipWriter::new(File::create(updated_path)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let rewrite: Option<fn(&str) -> Result<String, quick_xml::Error>> =
            match entry.name() {
                DOCUMENT_XML => Some(grid_tables),
                STYLES_XML => Some(with_grid_style),
                _ => None,
            };

        match rewrite {
            Some(rewrite) => {
                let name = entry.name().to_string();
                let mut xml = String::new();
                entry.read_to_string(&mut xml)?;
                let xml = rewrite(&xml)?;
                writer.start_file(name, options)?;
                writer.write_all(xml.as_bytes())?;
            }
            None => writer.raw_copy_file(entry)?,
        }
    }

    writer.finish()?;
    Ok(())
}

fn grid_style_ref() -> BytesStart<'static> {
    BytesStart::new("w:tblStyle").with_attributes([("w:val", GRID_STYLE_NAME)])
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, quick_xml::Error> {
    String::from_utf8(writer.into_inner())
        .map_err(|e| quick_xml::Error::NonDecodable(Some(e.utf8_error())))
}

/// Point every table's style at `TableGrid`, adding one where none is set.
fn grid_tables(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut in_properties = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:tblPr" => {
                writer.write_event(Event::Start(e))?;
                writer.write_event(Event::Empty(grid_style_ref()))?;
                in_properties = true;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:tblPr" => {
                writer.write_event(Event::Start(e.borrow()))?;
                writer.write_event(Event::Empty(grid_style_ref()))?;
                writer.write_event(Event::End(e.to_end()))?;
            }
            Event::End(e) if e.name().as_ref() == b"w:tblPr" => {
                writer.write_event(Event::End(e))?;
                in_properties = false;
            }
            Event::Empty(e)
                if in_properties && e.name().as_ref() == b"w:tblStyle" => {}
            Event::Start(e)
                if in_properties && e.name().as_ref() == b"w:tblStyle" =>
            {
                reader.read_to_end(e.name())?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    into_string(writer)
}

fn is_grid_style(e: &BytesStart) -> Result<bool, quick_xml::Error> {
    if e.name().as_ref() != b"w:style" {
        return Ok(false);
    }
    Ok(e.try_get_attribute("w:styleId")?
        .is_some_and(|id| id.value.as_ref() == GRID_STYLE_NAME.as_bytes()))
}

/// Append the `TableGrid` definition to the styles part unless it is there.
fn with_grid_style(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + GRID_STYLE.len()));
    let mut has_grid = false;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) | Event::Empty(e) => {
                has_grid |= is_grid_style(e)?;
            }
            Event::End(e) if e.name().as_ref() == b"w:styles" && !has_grid => {
                let mut style = Reader::from_str(GRID_STYLE);
                loop {
                    match style.read_event()? {
                        Event::Eof => break,
                        grid => writer.write_event(grid)?,
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        writer.write_event(event)?;
    }

    into_string(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID_STYLE_REF: &str = "<w:tblStyle w:val=\"TableGrid\"/>";
    const GRID_STYLE_ID: &str = "w:styleId=\"TableGrid\"";

    const PANDOC_TABLE: &str = "<w:body><w:tbl><w:tblPr>\
        <w:tblStyle w:val=\"Table\" /><w:tblW w:type=\"pct\" w:w=\"5000\" />\
        </w:tblPr><w:tr/></w:tbl><w:tbl><w:tblPr><w:tblLook w:val=\"0020\"/>\
        </w:tblPr></w:tbl></w:body>";

    const STYLES: &str = "<w:styles><w:style w:type=\"table\" \
        w:styleId=\"Table\"><w:name w:val=\"Table\"/></w:style></w:styles>";

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> String {
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[test]
    fn replaces_existing_style() {
        let xml = grid_tables(PANDOC_TABLE).unwrap();
        assert!(!xml.contains("w:val=\"Table\""), "{}", xml);
        assert!(xml.contains(
            "<w:tblPr><w:tblStyle w:val=\"TableGrid\"/>\
             <w:tblW w:type=\"pct\" w:w=\"5000\" /></w:tblPr>"
        ));
    }

    #[test]
    fn inserts_missing_style() {
        let xml = grid_tables(PANDOC_TABLE).unwrap();
        assert!(xml.contains(
            "<w:tblPr><w:tblStyle w:val=\"TableGrid\"/>\
             <w:tblLook w:val=\"0020\"/></w:tblPr>"
        ));
        assert_eq!(xml.matches(GRID_STYLE_REF).count(), 2);
    }

    #[test]
    fn band_sizes_are_not_table_styles() {
        let xml = grid_tables(
            "<w:tbl><w:tblPr><w:tblStyleRowBandSize w:val=\"1\"/>\
             <w:tblStyleColBandSize w:val=\"1\"/><w:tblStyle w:val=\"Plain\"/>\
             </w:tblPr></w:tbl>",
        )
        .unwrap();
        assert_eq!(
            xml,
            "<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/>\
             <w:tblStyleRowBandSize w:val=\"1\"/>\
             <w:tblStyleColBandSize w:val=\"1\"/></w:tblPr></w:tbl>"
        );
    }

    #[test]
    fn empty_table_properties_get_grid() {
        let xml = grid_tables("<w:tbl><w:tblPr/><w:tr/></w:tbl>").unwrap();
        assert_eq!(
            xml,
            "<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/></w:tblPr>\
             <w:tr/></w:tbl>"
        );
    }

    #[test]
    fn style_with_content_is_replaced() {
        let xml = grid_tables(
            "<w:tblPr><w:tblStyle w:val=\"Plain\"></w:tblStyle>\
             <w:jc w:val=\"center\"/></w:tblPr>",
        )
        .unwrap();
        assert_eq!(
            xml,
            "<w:tblPr><w:tblStyle w:val=\"TableGrid\"/>\
             <w:jc w:val=\"center\"/></w:tblPr>"
        );
    }

    #[test]
    fn no_tables_unchanged() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                   <w:body><w:p><w:t>a &amp; b</w:t></w:p></w:body>";
        assert_eq!(grid_tables(xml).unwrap(), xml);
    }

    #[test]
    fn mismatched_tags_are_an_error() {
        assert!(grid_tables("<w:tbl><w:tblPr></w:tbl>").is_err());
    }

    #[test]
    fn adds_grid_style_once() {
        let styles = with_grid_style(STYLES).unwrap();
        assert!(styles.contains(GRID_STYLE_ID));
        assert!(styles.ends_with("</w:style></w:styles>"));
        assert_eq!(with_grid_style(&styles).unwrap(), styles);
    }

    #[test]
    fn grid_style_seen_only_on_style_elements() {
        let styles = "<w:styles><w:latentStyles w:styleId=\"TableGrid\"/>\
                      </w:styles>";
        let xml = with_grid_style(styles).unwrap();
        assert_eq!(xml.matches(GRID_STYLE_ID).count(), 2);
        assert!(xml.contains("<w:name w:val=\"Table Grid\"/>"));
    }

    #[test]
    fn restyles_docx_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_1.docx");
        write_archive(
            &path,
            &[
                ("[Content_Types].xml", "<Types/>"),
                (DOCUMENT_XML, PANDOC_TABLE),
                (STYLES_XML, STYLES),
            ],
        );

        apply_table_grid(&path).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(
            read_entry(&mut archive, DOCUMENT_XML)
                .matches(GRID_STYLE_REF)
                .count(),
            2
        );
        assert!(read_entry(&mut archive, STYLES_XML).contains(GRID_STYLE_ID));
        assert_eq!(read_entry(&mut archive, "[Content_Types].xml"), "<Types/>");
        assert!(!dir.path().join("invoice_1.updated").exists());
    }

    #[test]
    fn malformed_document_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_2.docx");
        write_archive(
            &path,
            &[(DOCUMENT_XML, "<w:body><w:tbl></w:body>"), (STYLES_XML, STYLES)],
        );

        let error = apply_table_grid(&path).unwrap_err();
        assert!(matches!(error, DocumentError::Xml { .. }), "{}", error);
        assert!(!dir.path().join("invoice_2.updated").exists());

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(
            read_entry(&mut archive, DOCUMENT_XML),
            "<w:body><w:tbl></w:body>"
        );
    }

    #[test]
    fn missing_docx_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = apply_table_grid(&dir.path().join("nope.docx")).unwrap_err();
        assert!(matches!(error, DocumentError::Io { .. }));
    }

    #[test]
    fn missing_converter_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = convert(
            "calinvoice-no-such-converter",
            "\\section{x}",
            &dir.path().join("out.docx"),
            None,
        )
        .unwrap_err();
        assert!(matches!(error, DocumentError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_converter_reports_its_status() {
        let dir = tempfile::tempdir().unwrap();
        // `false` exits without reading stdin, so the write may hit a closed pipe
        let latex = "x".repeat(1 << 20);
        let error =
            convert("false", &latex, &dir.path().join("out.docx"), None)
                .unwrap_err();
        assert!(matches!(error, DocumentError::Pandoc { .. }), "{}", error);
    }
}
