use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;
use rimtrans_core::{Result, TransUnit};

/// Ordered catalog of extracted units, ready to be written as a POT/PO file.
#[derive(Debug, Clone)]
pub struct PotCatalog {
    units: Vec<TransUnit>,
}

impl PotCatalog {
    /// Def extraction mode: entries sorted ascending by source line.
    /// The sort is stable, so units on the same line keep discovery order.
    pub fn from_def_units(mut units: Vec<TransUnit>) -> Self {
        units.sort_by_key(|u| u.line.unwrap_or(0));
        Self { units }
    }

    /// Keyed mode: entries stay in document order.
    pub fn from_keyed_units(units: Vec<TransUnit>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[TransUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

fn escape_po(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

/// Write the catalog as a gettext POT/PO file.
///
/// The header carries the fixed placeholder metadata downstream translation
/// tooling expects, flagged fuzzy as usual for generated templates. With
/// `seed_translations` every msgstr is pre-filled with its msgid, which
/// turns the output into an editable compendium instead of an empty
/// template.
pub fn write_pot(path: &Path, catalog: &PotCatalog, seed_translations: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    write_pot_to(&mut w, catalog, seed_translations)?;
    w.flush()?;
    Ok(())
}

pub fn write_pot_to<W: Write>(w: &mut W, catalog: &PotCatalog, seed_translations: bool) -> Result<()> {
    let now = Local::now().format("%Y-%m-%d %H:%M").to_string();

    // --- Header ---
    writeln!(w, "#, fuzzy")?;
    writeln!(w, "msgid \"\"")?;
    writeln!(w, "msgstr \"\"")?;
    writeln!(w, "\"Project-Id-Version: 1.0\\n\"")?;
    writeln!(w, "\"Report-Msgid-Bugs-To: you@example.com\\n\"")?;
    writeln!(w, "\"POT-Creation-Date: {now}\\n\"")?;
    writeln!(w, "\"PO-Revision-Date: {now}\\n\"")?;
    writeln!(w, "\"Last-Translator: Some Translator <yourname@example.com>\\n\"")?;
    writeln!(w, "\"Language-Team: English <yourteam@example.com>\\n\"")?;
    writeln!(w, "\"MIME-Version: 1.0\\n\"")?;
    writeln!(w, "\"Content-Type: text/plain; charset=utf-8\\n\"")?;
    writeln!(w, "\"Content-Transfer-Encoding: 8bit\\n\"")?;

    // --- Entries ---
    for u in catalog.units() {
        writeln!(w)?;
        if let Some(line) = u.line {
            writeln!(w, "#: {}:{}", u.path.display(), line)?;
        } else {
            writeln!(w, "#: {}", u.path.display())?;
        }
        let msgid = u.source.as_deref().unwrap_or("");
        writeln!(w, "msgctxt \"{}\"", escape_po(&u.key))?;
        writeln!(w, "msgid \"{}\"", escape_po(msgid))?;
        if seed_translations {
            writeln!(w, "msgstr \"{}\"", escape_po(msgid))?;
        } else {
            writeln!(w, "msgstr \"\"")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unit(key: &str, src: &str, line: u32) -> TransUnit {
        TransUnit {
            key: key.into(),
            source: Some(src.into()),
            path: PathBuf::from("Defs/Things.xml"),
            line: Some(line),
        }
    }

    fn render(catalog: &PotCatalog, seed: bool) -> String {
        let mut buf = Vec::new();
        write_pot_to(&mut buf, catalog, seed).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_carries_fixed_metadata_and_fuzzy_flag() {
        let catalog = PotCatalog::from_def_units(vec![]);
        let s = render(&catalog, false);
        assert!(s.starts_with("#, fuzzy\nmsgid \"\"\nmsgstr \"\"\n"));
        for field in [
            "\"Project-Id-Version: 1.0\\n\"",
            "\"Report-Msgid-Bugs-To: you@example.com\\n\"",
            "\"POT-Creation-Date: ",
            "\"PO-Revision-Date: ",
            "\"Last-Translator: Some Translator <yourname@example.com>\\n\"",
            "\"Language-Team: English <yourteam@example.com>\\n\"",
            "\"MIME-Version: 1.0\\n\"",
            "\"Content-Type: text/plain; charset=utf-8\\n\"",
            "\"Content-Transfer-Encoding: 8bit\\n\"",
        ] {
            assert!(s.contains(field), "missing header field: {field}");
        }
    }

    #[test]
    fn def_catalog_sorts_by_line_stably() {
        let catalog = PotCatalog::from_def_units(vec![
            unit("B.description", "b", 9),
            unit("A.label", "a", 3),
            unit("B.label", "first-at-nine", 9),
        ]);
        let keys: Vec<&str> = catalog.units().iter().map(|u| u.key.as_str()).collect();
        assert_eq!(keys, ["A.label", "B.description", "B.label"]);
    }

    #[test]
    fn keyed_catalog_keeps_document_order() {
        let catalog = PotCatalog::from_keyed_units(vec![
            unit("Zulu", "z", 9),
            unit("Alpha", "a", 3),
        ]);
        let keys: Vec<&str> = catalog.units().iter().map(|u| u.key.as_str()).collect();
        assert_eq!(keys, ["Zulu", "Alpha"]);
    }

    #[test]
    fn entries_carry_reference_context_and_source() {
        let catalog = PotCatalog::from_def_units(vec![unit("Apple.label", "apple", 5)]);
        let s = render(&catalog, false);
        assert!(s.contains("#: Defs/Things.xml:5"));
        assert!(s.contains("msgctxt \"Apple.label\""));
        assert!(s.contains("msgid \"apple\""));
        assert!(s.contains("msgstr \"\""));
    }

    #[test]
    fn seeding_copies_msgid_into_msgstr() {
        let catalog = PotCatalog::from_keyed_units(vec![unit("Greeting", "Hello", 3)]);
        let s = render(&catalog, true);
        assert!(s.contains("msgid \"Hello\"\nmsgstr \"Hello\""));
    }

    #[test]
    fn escapes_quotes_and_newlines() {
        let catalog =
            PotCatalog::from_def_units(vec![unit("K", "say \"hi\"\nand wave", 1)]);
        let s = render(&catalog, false);
        assert!(s.contains(r#"msgid "say \"hi\"\nand wave""#));
    }
}
