//! Font selection.
//!
//! Japanese text needs an external font. The candidates are tried in order
//! and the first readable file wins; if none is readable the documents fall
//! back to the built-in Helvetica, which cannot show kana or kanji. Every
//! skipped candidate is logged.
//!
//! Font collections (`.ttc`) are embedded whole and many PDF viewers cannot
//! show them, so the defaults list single-face `.ttf`/`.otf` files first.

use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// The font a document will be set in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectedFont {
    External { path: PathBuf, data: Vec<u8> },
    Builtin,
}

impl SelectedFont {
    pub fn describe(&self) -> String {
        match self {
            SelectedFont::External { path, .. } => path.display().to_string(),
            SelectedFont::Builtin => "built-in Helvetica".to_owned(),
        }
    }
}

/// Well-known locations of Japanese fonts on Windows, macOS and Linux.
pub fn default_candidates() -> Vec<PathBuf> {
    [
        "C:/Windows/Fonts/ipaexg.ttf",
        "C:/Windows/Fonts/ipag.ttf",
        "/Library/Fonts/Osaka.ttf",
        "/Library/Fonts/ipaexg.ttf",
        "/usr/share/fonts/opentype/ipaexfont-gothic/ipaexg.ttf",
        "/usr/share/fonts/opentype/ipafont-gothic/ipag.ttf",
        "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
        "/usr/share/fonts/opentype/noto/NotoSansJP-Regular.otf",
        "/usr/share/fonts/google-noto-sans-jp/NotoSansJP-Regular.otf",
        "C:/Windows/Fonts/msgothic.ttc",
        "C:/Windows/Fonts/msmincho.ttc",
        "C:/Windows/Fonts/YuGothM.ttc",
        "C:/Windows/Fonts/meiryo.ttc",
        "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

/// Whether `path` names a font collection (`.ttc`, `.otc`).
pub fn is_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc") || e.eq_ignore_ascii_case("otc"))
}

fn try_candidate(path: &Path) -> Option<Vec<u8>> {
    if !path.exists() {
        debug!(target: "kyuyo", "font not found: {}", path.display());
        return None;
    }
    match fs::read(path) {
        Ok(data) if data.is_empty() => {
            warn!(target: "kyuyo", "font file is empty: {}", path.display());
            None
        }
        Ok(data) => Some(data),
        Err(e) => {
            warn!(target: "kyuyo", "cannot read font {}: {e}", path.display());
            None
        }
    }
}

/// Walk the fallback chain.
pub fn select_font(candidates: &[PathBuf]) -> SelectedFont {
    for path in candidates {
        if let Some(data) = try_candidate(path) {
            info!(target: "kyuyo", "font: {}", path.display());
            if is_collection(path) {
                warn!(
                    target: "kyuyo",
                    "{} is a font collection, some PDF viewers may not show it",
                    path.display()
                );
            }
            return SelectedFont::External {
                path: path.clone(),
                data,
            };
        }
    }
    warn!(
        target: "kyuyo",
        "none of {} font candidates is usable, using built-in Helvetica",
        candidates.len()
    );
    SelectedFont::Builtin
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_candidates_is_builtin() {
        assert_eq!(select_font(&[]), SelectedFont::Builtin);
    }

    #[test]
    fn first_readable_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.ttf");
        let good = dir.path().join("good.ttf");
        let other = dir.path().join("other.ttf");
        fs::write(&empty, b"").unwrap();
        fs::write(&good, b"font bytes").unwrap();
        fs::write(&other, b"other bytes").unwrap();
        let candidates = vec![dir.path().join("missing.ttf"), empty, good.clone(), other];
        match select_font(&candidates) {
            SelectedFont::External { path, data } => {
                assert_eq!(path, good);
                assert_eq!(data, b"font bytes");
            }
            SelectedFont::Builtin => panic!("expected an external font"),
        }
    }

    #[test]
    fn collections_come_last() {
        let candidates = default_candidates();
        let first = candidates.iter().position(|p| is_collection(p)).unwrap();
        assert!(first > 0);
        assert!(candidates[first..].iter().all(|p| is_collection(p)));
        assert!(is_collection(Path::new("C:/Windows/Fonts/MSGOTHIC.TTC")));
        assert!(!is_collection(Path::new("ipaexg.ttf")));
        assert!(!is_collection(Path::new("ttc")));
    }

    #[test]
    fn a_collection_is_still_usable() {
        let dir = tempfile::tempdir().unwrap();
        let ttc = dir.path().join("gothic.ttc");
        fs::write(&ttc, b"collection bytes").unwrap();
        let font = select_font(&[dir.path().join("missing.ttf"), ttc.clone()]);
        assert_eq!(font.describe(), ttc.display().to_string());
    }
}
