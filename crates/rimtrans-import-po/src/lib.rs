use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use color_eyre::eyre::eyre;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rimtrans_core::{PoEntry, Result};
use tracing::warn;

const PROJECT_URL: &str = "https://github.com/rimtrans/rimtrans";

#[derive(Clone, Copy)]
enum Field {
    None,
    Ctxt,
    Id,
    Str,
}

/// Simple line-oriented .po parser: collects reference + flags + msgctxt +
/// msgstr, with `"..."` continuation lines. Header and translator comments
/// are ignored; the metadata entry has no msgctxt and is dropped.
pub fn read_po_entries(po_path: &Path) -> Result<Vec<PoEntry>> {
    let file = File::open(po_path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    let mut cur_ref: Option<String> = None;
    let mut cur_ctxt: Option<String> = None;
    let mut cur_str: Option<String> = None;
    let mut cur_fuzzy = false;
    let mut field = Field::None;

    let mut flush = |cur_ref: &mut Option<String>,
                     cur_ctxt: &mut Option<String>,
                     cur_str: &mut Option<String>,
                     cur_fuzzy: &mut bool,
                     out: &mut Vec<PoEntry>| {
        if let (Some(k), Some(v)) = (cur_ctxt.take(), cur_str.take()) {
            out.push(PoEntry {
                key: k,
                value: v,
                fuzzy: *cur_fuzzy,
                reference: cur_ref.take(),
            });
        }
        *cur_ref = None;
        *cur_ctxt = None;
        *cur_str = None;
        *cur_fuzzy = false;
    };

    for line in reader.lines() {
        let l = line?;
        let lt = l.trim();

        if lt.starts_with("#,") {
            if lt.contains("fuzzy") {
                cur_fuzzy = true;
            }
            continue;
        }

        if lt.starts_with("#:") {
            if cur_ref.is_none() {
                cur_ref = Some(lt.trim_start_matches("#:").trim().to_string());
            }
            continue;
        }

        if lt.starts_with('#') {
            continue;
        }

        if let Some(rest) = lt.strip_prefix("msgctxt") {
            cur_ctxt = Some(parse_po_string(rest)?);
            field = Field::Ctxt;
            continue;
        }

        if let Some(rest) = lt.strip_prefix("msgstr") {
            cur_str = Some(parse_po_string(rest)?);
            field = Field::Str;
            continue;
        }

        if let Some(rest) = lt.strip_prefix("msgid") {
            // msgid itself is not needed for injection, but track the state
            // so its continuation lines are not glued onto msgstr
            parse_po_string(rest)?;
            field = Field::Id;
            continue;
        }

        if lt.starts_with('"') {
            let val = parse_po_string(lt)?;
            match field {
                Field::Ctxt => {
                    if let Some(ref mut s) = cur_ctxt {
                        s.push_str(&val);
                    }
                }
                Field::Str => {
                    if let Some(ref mut s) = cur_str {
                        s.push_str(&val);
                    }
                }
                Field::Id | Field::None => {}
            }
            continue;
        }

        if lt.is_empty() {
            flush(&mut cur_ref, &mut cur_ctxt, &mut cur_str, &mut cur_fuzzy, &mut out);
            field = Field::None;
        }
    }

    flush(&mut cur_ref, &mut cur_ctxt, &mut cur_str, &mut cur_fuzzy, &mut out);

    Ok(out)
}

fn parse_po_string(s: &str) -> Result<String> {
    let s = s.trim();
    if !s.starts_with('"') || !s.ends_with('"') || s.len() < 2 {
        return Err(eyre!("invalid po string: {s}"));
    }
    let inner = &s[1..s.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                match next {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    other => out.push(other),
                }
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Context keys are used verbatim as element names, and not every string is
/// one: allow an alphabetic/underscore start, then alphanumerics plus `.`,
/// `-` and `_`.
pub fn is_valid_xml_tag(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// Generate a LanguageData XML file from parsed PO entries.
///
/// Entries with an empty msgstr or a fuzzy flag are omitted, as are keys
/// that would not survive as XML element names.
pub fn write_language_data_xml(out_path: &Path, entries: &[PoEntry]) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(out_path)?;
    let mut w = BufWriter::new(file);
    write_language_data_to(&mut w, entries)?;
    w.flush()?;
    Ok(())
}

pub fn write_language_data_to<W: Write>(out: W, entries: &[PoEntry]) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let banner = format!(
        " This file autogenerated with rimtrans v{} ",
        env!("CARGO_PKG_VERSION")
    );
    let url_line = format!(" {PROJECT_URL} ");
    for comment in [
        banner.as_str(),
        url_line.as_str(),
        " Don't edit this file manually, edit PO file and regenerate this file! ",
    ] {
        writer.write_event(Event::Comment(BytesText::from_escaped(comment)))?;
    }

    writer.write_event(Event::Start(BytesStart::new("LanguageData")))?;
    for e in entries {
        if e.value.is_empty() || e.fuzzy {
            continue;
        }
        if !is_valid_xml_tag(&e.key) {
            warn!("'{}' is not usable as an XML tag name, entry skipped", e.key);
            continue;
        }
        writer.write_event(Event::Start(BytesStart::new(e.key.as_str())))?;
        writer.write_event(Event::Text(BytesText::new(&e.value)))?;
        writer.write_event(Event::End(BytesEnd::new(e.key.as_str())))?;
    }
    writer.write_event(Event::End(BytesEnd::new("LanguageData")))?;

    let mut out = writer.into_inner();
    out.write_all(b"\n")?;
    Ok(())
}
