use std::path::Path;

use rimtrans_core::Result;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "rimtrans.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RimTransConfig {
    pub log_level: Option<String>,
    pub extract: Option<ExtractCfg>,
    pub inject: Option<InjectCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractCfg {
    pub source_dir: Option<String>,
    pub out_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InjectCfg {
    pub po_dir: Option<String>,
    pub out_dir: Option<String>,
    pub backup: Option<bool>,
}

/// Load `rimtrans.toml` from `dir` if present. A missing file is not an
/// error; a malformed one is.
pub fn load_config(dir: &Path) -> Result<Option<RimTransConfig>> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    let cfg: RimTransConfig = toml::from_str(&text)?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn parses_sections_and_top_level() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
log_level = "debug"

[extract]
source_dir = "Mods/My/Defs"
out_dir = "po"

[inject]
po_dir = "po"
backup = true
"#,
        )
        .unwrap();

        let cfg = load_config(dir.path()).unwrap().unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(
            cfg.extract.as_ref().unwrap().source_dir.as_deref(),
            Some("Mods/My/Defs")
        );
        assert_eq!(cfg.inject.as_ref().unwrap().backup, Some(true));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "log_level = [").unwrap();
        assert!(load_config(dir.path()).is_err());
    }
}
