use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use rimtrans_core::{Result, RimTransError, TransUnit};
use roxmltree::{Document, Node};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Accepted spellings for the record-name anchor. Some mods capitalize the
/// first letter, the game accepts both.
pub const DEF_NAME_TAGS: &[&str] = &["defName", "DefName"];

/// Known translatable field names inside a Def record.
pub const LABELS: &[&str] = &[
    "beginLetter",
    "beginLetterLabel",
    "description",
    "fixedName",
    "gerund",
    "gerundLabel",
    "helpText",
    "ingestCommandString",
    "ingestReportString",
    "inspectLine",
    "label",
    "labelShort",
    "letterLabel",
    "letterText",
    "pawnLabel",
    "pawnsPlural",
    "rulesStrings",
    "recoveryMessage",
    "reportString",
    "skillLabel",
    "text",
    "useLabel",
    "verb",
];

/// Rewrite a structural path fragment into a DefInjected tag fragment.
///
/// `/comps/li[2]/label` becomes `.comps.1.label`: separators turn into dots,
/// a bare `li` means the first list item (index 0) and a 1-based `li[N]`
/// becomes the 0-based `N-1`. Only the first bracketed index is rewritten;
/// later ones stay verbatim.
pub fn normalize_definj_path(raw: &str) -> String {
    static LI_MID: OnceLock<Regex> = OnceLock::new();
    static LI_END: OnceLock<Regex> = OnceLock::new();
    static LI_IDX: OnceLock<Regex> = OnceLock::new();

    let mut s = raw.replace('/', ".");
    let li_mid = LI_MID.get_or_init(|| Regex::new(r"\.li\.").unwrap());
    s = li_mid.replace_all(&s, ".0.").into_owned();
    let li_end = LI_END.get_or_init(|| Regex::new(r"\.li$").unwrap());
    s = li_end.replace(&s, ".0").into_owned();
    let li_idx = LI_IDX.get_or_init(|| Regex::new(r"\.li\[(\d+)\]").unwrap());
    s = li_idx
        .replace(&s, |caps: &regex::Captures| {
            let n: u64 = caps[1].parse().unwrap_or(1);
            format!(".{}", n.saturating_sub(1))
        })
        .into_owned();
    s
}

fn node_line(doc: &Document, node: Node) -> u32 {
    doc.text_pos_at(node.range().start).row
}

/// One path segment for `node`: the tag name, with a 1-based `[N]` suffix
/// when the element has same-named siblings.
fn path_segment(node: Node) -> String {
    let name = node.tag_name().name();
    let Some(parent) = node.parent() else {
        return name.to_string();
    };
    let mut pos = 0usize;
    let mut count = 0usize;
    for sib in parent
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == name)
    {
        count += 1;
        if sib == node {
            pos = count;
        }
    }
    if count > 1 {
        format!("{name}[{pos}]")
    } else {
        name.to_string()
    }
}

/// Structural path of `node` below `ancestor`, e.g. `/comps/li[2]/label`.
fn element_path_below<'a, 'i>(node: Node<'a, 'i>, ancestor: Node<'a, 'i>) -> String {
    let mut segs: Vec<String> = Vec::new();
    let mut cur = node;
    while cur != ancestor {
        segs.push(path_segment(cur));
        match cur.parent() {
            Some(p) if p.is_element() => cur = p,
            _ => break,
        }
    }
    let mut out = String::new();
    for seg in segs.iter().rev() {
        out.push('/');
        out.push_str(seg);
    }
    out
}

/// Walk a Defs document and extract every translatable label string.
///
/// Records are anchored on their `defName`/`DefName` element; each known
/// label field below the record becomes one unit keyed
/// `<defName><normalized path>`. Container labels (list fields such as
/// `rulesStrings`) contribute one unit per child item instead of one for
/// the container itself. Malformed XML is fatal.
pub fn extract_def_units(xml: &str, source_path: &Path) -> Result<Vec<TransUnit>> {
    let doc = Document::parse(xml).map_err(|e| RimTransError::Xml(e.to_string()))?;
    let mut out = Vec::new();

    for def_tag in DEF_NAME_TAGS {
        for def_node in doc
            .root_element()
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == *def_tag)
        {
            let Some(parent) = def_node.parent().filter(|p| p.is_element()) else {
                continue;
            };
            let Some(def_name) = def_node.text().map(str::trim).filter(|t| !t.is_empty()) else {
                warn!(
                    "{} at line {} has no text, record skipped",
                    def_tag,
                    node_line(&doc, def_node)
                );
                continue;
            };
            debug!(
                "found {} '{}' ({})",
                def_tag,
                def_name,
                parent.tag_name().name()
            );

            for label in LABELS {
                debug!("checking label {label}");
                for label_node in parent
                    .descendants()
                    .filter(|n| n.is_element() && n.tag_name().name() == *label)
                {
                    debug!(
                        "found label '{}' at line {}",
                        label,
                        node_line(&doc, label_node)
                    );
                    let children: Vec<Node> =
                        label_node.children().filter(|c| c.is_element()).collect();
                    if !children.is_empty() {
                        for child in children {
                            let frag = normalize_definj_path(&element_path_below(child, parent));
                            let key = format!("{def_name}{frag}");
                            debug!("msgctxt: {key}");
                            out.push(TransUnit {
                                key,
                                source: Some(child.text().unwrap_or("").to_string()),
                                path: source_path.to_path_buf(),
                                line: Some(node_line(&doc, child)),
                            });
                        }
                    } else {
                        let frag = normalize_definj_path(&element_path_below(label_node, parent));
                        match label_node.text().filter(|t| !t.is_empty()) {
                            Some(text) => {
                                let key = format!("{def_name}{frag}");
                                debug!("msgctxt: {key}");
                                out.push(TransUnit {
                                    key,
                                    source: Some(text.to_string()),
                                    path: source_path.to_path_buf(),
                                    line: Some(node_line(&doc, label_node)),
                                });
                            }
                            None => warn!("{frag} has empty message, skipped"),
                        }
                    }
                }
            }
        }
    }

    Ok(out)
}

/// Extract units from a flat Keyed/LanguageData file: every direct element
/// child of a `LanguageData` node is one unit, tag as key, in document order.
pub fn extract_keyed_units(xml: &str, source_path: &Path) -> Result<Vec<TransUnit>> {
    let doc = Document::parse(xml).map_err(|e| RimTransError::Xml(e.to_string()))?;
    let mut out = Vec::new();

    for lang_node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "LanguageData")
    {
        for el in lang_node.children().filter(|c| c.is_element()) {
            let key = el.tag_name().name().to_string();
            debug!("keyed entry: {key}");
            out.push(TransUnit {
                key,
                source: Some(el.text().unwrap_or("").to_string()),
                path: source_path.to_path_buf(),
                line: Some(node_line(&doc, el)),
            });
        }
    }

    Ok(out)
}

fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn scan_with<F>(root: &Path, extract: F) -> Result<Vec<(PathBuf, Vec<TransUnit>)>>
where
    F: Fn(&str, &Path) -> Result<Vec<TransUnit>>,
{
    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_xml_file(path) {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let text = std::fs::read_to_string(path)?;
        let units = extract(&text, &rel)?;
        out.push((rel, units));
    }
    Ok(out)
}

/// Scan `root` for Defs XML files, one entry per file in file-name order.
pub fn scan_defs_xml(root: &Path) -> Result<Vec<(PathBuf, Vec<TransUnit>)>> {
    scan_with(root, |text, rel| extract_def_units(text, rel))
}

/// Scan `root` for Keyed/LanguageData XML files.
pub fn scan_keyed_xml(root: &Path) -> Result<Vec<(PathBuf, Vec<TransUnit>)>> {
    scan_with(root, |text, rel| extract_keyed_units(text, rel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn defs(xml: &str) -> Vec<TransUnit> {
        extract_def_units(xml, Path::new("Defs/Test.xml")).unwrap()
    }

    #[test]
    fn normalizes_list_markers() {
        assert_eq!(normalize_definj_path(".li.foo"), ".0.foo");
        assert_eq!(normalize_definj_path("x.li"), "x.0");
        assert_eq!(normalize_definj_path(".li[3].bar"), ".2.bar");
        assert_eq!(normalize_definj_path("/comps/li[2]/label"), ".comps.1.label");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_definj_path("/stages/li[2]/label");
        assert_eq!(normalize_definj_path(&once), once);
    }

    #[test]
    fn only_first_bracketed_index_is_rewritten() {
        assert_eq!(
            normalize_definj_path(".a.li[2].b.li[4]"),
            ".a.1.b.li[4]"
        );
    }

    #[test]
    fn extracts_leaf_labels_with_lines() {
        let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\"?>
<Defs>
  <ThingDef>
    <defName>Apple</defName>
    <label>apple</label>
    <description>A tasty fruit.</description>
  </ThingDef>
</Defs>
";
        let units = defs(xml);
        assert_eq!(units.len(), 2);
        // walker order follows the label table: description before label
        assert_eq!(units[0].key, "Apple.description");
        assert_eq!(units[0].source.as_deref(), Some("A tasty fruit."));
        assert_eq!(units[0].line, Some(6));
        assert_eq!(units[1].key, "Apple.label");
        assert_eq!(units[1].line, Some(5));
    }

    #[test]
    fn accepts_capitalized_def_name() {
        let xml = "\
<Defs>
  <ThingDef>
    <DefName>Odd</DefName>
    <label>odd thing</label>
  </ThingDef>
</Defs>
";
        let units = defs(xml);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key, "Odd.label");
    }

    #[test]
    fn container_label_emits_one_unit_per_item() {
        let xml = "\
<Defs>
  <RulePackDef>
    <defName>NamerGun</defName>
    <rulesStrings>
      <li>r_name->gun</li>
      <li>r_name->blaster</li>
    </rulesStrings>
  </RulePackDef>
</Defs>
";
        let units = defs(xml);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].key, "NamerGun.rulesStrings.0");
        assert_eq!(units[0].source.as_deref(), Some("r_name->gun"));
        assert_eq!(units[1].key, "NamerGun.rulesStrings.1");
        assert_eq!(units[1].source.as_deref(), Some("r_name->blaster"));
    }

    #[test]
    fn container_label_with_single_child_emits_one_unit() {
        let xml = "\
<Defs>
  <IncidentDef>
    <defName>Raid</defName>
    <letterText>
      <li>Enemies approach.</li>
    </letterText>
  </IncidentDef>
</Defs>
";
        let units = defs(xml);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key, "Raid.letterText.0");
        assert_eq!(units[0].source.as_deref(), Some("Enemies approach."));
    }

    #[test]
    fn comment_children_are_not_items() {
        let xml = "\
<Defs>
  <IncidentDef>
    <defName>Raid</defName>
    <letterText>
      <!-- translator note -->
      <li>Enemies approach.</li>
    </letterText>
  </IncidentDef>
</Defs>
";
        let units = defs(xml);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key, "Raid.letterText.0");
    }

    #[test]
    fn nested_leaf_under_unnamed_list_gets_zero_index() {
        let xml = "\
<Defs>
  <HediffDef>
    <defName>Bruise</defName>
    <stages>
      <li>
        <label>bruised</label>
      </li>
    </stages>
  </HediffDef>
</Defs>
";
        let units = defs(xml);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key, "Bruise.stages.0.label");
    }

    #[test]
    fn empty_leaf_label_is_skipped() {
        let xml = "\
<Defs>
  <ThingDef>
    <defName>Husk</defName>
    <label></label>
    <description>Still here.</description>
  </ThingDef>
</Defs>
";
        let units = defs(xml);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key, "Husk.description");
    }

    #[test]
    fn malformed_xml_is_fatal() {
        assert!(extract_def_units("<Defs><broken", Path::new("x.xml")).is_err());
    }

    #[test]
    fn keyed_units_keep_document_order_and_lines() {
        let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\"?>
<LanguageData>
  <Greeting>Hello</Greeting>
  <Farewell>Bye</Farewell>
</LanguageData>
";
        let units = extract_keyed_units(xml, Path::new("Keyed/A.xml")).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].key, "Greeting");
        assert_eq!(units[0].source.as_deref(), Some("Hello"));
        assert_eq!(units[0].line, Some(3));
        assert_eq!(units[1].key, "Farewell");
        assert_eq!(units[1].line, Some(4));
    }
}
