//! File filtering rules.

use serde::{Deserialize, Serialize};

/// Include/exclude rules applied to every candidate file name.
///
/// Precedence, first match wins:
/// 1. file name in `exclude_file_names` (case-insensitive exact) — reject;
/// 2. extension in `exclude_extensions` — reject;
/// 3. `include_extensions` non-empty and extension not in it — reject;
/// 4. accept.
///
/// Extension entries are accepted with or without the leading dot and are
/// matched case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFilters {
    #[serde(default)]
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_file_names: Vec<String>,
}

impl FileFilters {
    /// Applies the precedence rules to a bare file name.
    pub fn should_include(&self, file_name: &str) -> bool {
        if self
            .exclude_file_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(file_name))
        {
            return false;
        }

        let ext = extension_of(file_name);

        if self
            .exclude_extensions
            .iter()
            .any(|e| ext_matches(e, &ext))
        {
            return false;
        }

        if !self.include_extensions.is_empty()
            && !self
                .include_extensions
                .iter()
                .any(|e| ext_matches(e, &ext))
        {
            return false;
        }

        true
    }
}

/// Lowercased extension with leading dot, or empty for none.
fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        // A name like ".gitignore" has no extension, it is a dotfile.
        Some((stem, ext)) if !stem.is_empty() => format!(".{}", ext.to_ascii_lowercase()),
        _ => String::new(),
    }
}

fn ext_matches(configured: &str, ext: &str) -> bool {
    let c = configured.strip_prefix('.').unwrap_or(configured);
    let e = ext.strip_prefix('.').unwrap_or(ext);
    c.eq_ignore_ascii_case(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_everything() {
        let f = FileFilters::default();
        assert!(f.should_include("anything.bin"));
        assert!(f.should_include("no_extension"));
    }

    #[test]
    fn name_exclusion_wins_first() {
        let f = FileFilters {
            exclude_file_names: vec!["Thumbs.db".into()],
            ..Default::default()
        };
        assert!(!f.should_include("thumbs.db"));
        assert!(f.should_include("other.db"));
    }

    #[test]
    fn extension_exclusion() {
        let f = FileFilters {
            exclude_extensions: vec![".log".into(), "tmp".into()],
            ..Default::default()
        };
        assert!(!f.should_include("trace.LOG"));
        assert!(!f.should_include("scratch.tmp"));
        assert!(f.should_include("data.csv"));
    }

    #[test]
    fn include_list_restricts_when_present() {
        let f = FileFilters {
            include_extensions: vec![".csv".into(), ".json".into()],
            ..Default::default()
        };
        assert!(f.should_include("a.csv"));
        assert!(f.should_include("a.JSON"));
        assert!(!f.should_include("a.txt"));
        assert!(!f.should_include("no_extension"));
    }

    #[test]
    fn excluded_name_with_excluded_extension_rejected_once() {
        let f = FileFilters {
            exclude_file_names: vec!["skip.log".into()],
            exclude_extensions: vec![".log".into()],
            ..Default::default()
        };
        assert!(!f.should_include("skip.log"));
    }

    #[test]
    fn dotfiles_have_no_extension() {
        let f = FileFilters {
            include_extensions: vec![".txt".into()],
            ..Default::default()
        };
        assert!(!f.should_include(".gitignore"));
    }
}
