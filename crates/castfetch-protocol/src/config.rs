//! TACT build-config / cdn-config parser.
//!
//! Lines of `key = value`. A handful of keys are known to carry
//! space-separated lists (`archives`, `patch-archives`, `builds`,
//! `encoding-size`); every other key is a scalar string. Unknown keys stay
//! reachable through the generic map — this client does not need a typed
//! field for every key TACT happens to emit.

use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::warn;

const LIST_VALUED_KEYS: &[&str] = &[
    "archives",
    "patch-archives",
    "builds",
    "encoding-size",
    "encoding",
    "install",
    "download",
];

#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: HashMap<String, Vec<String>>,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line, "cannot parse config line");
                return Err(Error::ConfigSyntax(line.to_owned()));
            };
            let key = key.trim().to_owned();
            let value = value.trim();

            let tokens = if LIST_VALUED_KEYS.contains(&key.as_str()) {
                value.split_whitespace().map(str::to_owned).collect()
            } else {
                vec![value.to_owned()]
            };

            entries.insert(key, tokens);
        }

        Ok(Self { entries })
    }

    /// The raw tokens for `key`, or `None` if the key is absent.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// The single scalar value of `key`, if present and single-valued.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// A space-separated list field, e.g. `archives` or `patch-archives`.
    pub fn list(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// `root` is a single content key, when present.
    pub fn root(&self) -> Option<&str> {
        self.scalar("root")
    }

    /// `encoding` is `<cKey> <eKey>` when both are known, or just `<cKey>`
    /// before the encoding blob has been built. Returns `(cKey, eKey)` where
    /// the EKey falls back to the CKey when no second token is present.
    pub fn encoding(&self) -> Option<(&str, &str)> {
        let tokens = self.get("encoding")?;
        let ckey = tokens.first()?.as_str();
        let ekey = tokens.get(1).map_or(ckey, String::as_str);
        Some((ckey, ekey))
    }

    pub fn archives(&self) -> Vec<&str> {
        self.list("archives")
    }

    pub fn patch_archives(&self) -> Vec<&str> {
        self.list("patch-archives")
    }

    /// `install` is `<cKey> <eKey>` when both are known, or just `<cKey>`,
    /// same shape as `encoding`. Parsed for completeness; not resolved
    /// further by this client.
    pub fn install(&self) -> Option<(&str, &str)> {
        let tokens = self.get("install")?;
        let ckey = tokens.first()?.as_str();
        let ekey = tokens.get(1).map_or(ckey, String::as_str);
        Some((ckey, ekey))
    }

    /// `download` is `<cKey> <eKey>` when both are known, or just `<cKey>`,
    /// same shape as `encoding`. Parsed for completeness; not resolved
    /// further by this client.
    pub fn download(&self) -> Option<(&str, &str)> {
        let tokens = self.get("download")?;
        let ckey = tokens.first()?.as_str();
        let ekey = tokens.get(1).map_or(ckey, String::as_str);
        Some((ckey, ekey))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalar_and_list_keys_split_correctly() {
        let content = "root = deadbeef\narchives = a b c\n";
        let cfg = Config::parse(content).unwrap();
        assert_eq!(cfg.root(), Some("deadbeef"));
        assert_eq!(cfg.archives(), vec!["a", "b", "c"]);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let content = "# a comment\n\nroot = deadbeef\n";
        let cfg = Config::parse(content).unwrap();
        assert_eq!(cfg.root(), Some("deadbeef"));
    }

    #[test]
    fn encoding_falls_back_to_single_token() {
        let content = "encoding = ckeyvalue\n";
        let cfg = Config::parse(content).unwrap();
        assert_eq!(cfg.encoding(), Some(("ckeyvalue", "ckeyvalue")));
    }

    #[test]
    fn encoding_pair_splits_ckey_and_ekey() {
        let content = "encoding = ckeyvalue ekeyvalue\n";
        let cfg = Config::parse(content).unwrap();
        assert_eq!(cfg.encoding(), Some(("ckeyvalue", "ekeyvalue")));
    }

    #[test]
    fn install_and_download_split_ckey_and_ekey() {
        let content = "install = ckey1 ekey1\ndownload = ckey2\n";
        let cfg = Config::parse(content).unwrap();
        assert_eq!(cfg.install(), Some(("ckey1", "ekey1")));
        assert_eq!(cfg.download(), Some(("ckey2", "ckey2")));
    }

    #[test]
    fn unknown_keys_are_scalar_and_reachable() {
        let content = "build-name = 1.2.3.4567\n";
        let cfg = Config::parse(content).unwrap();
        assert_eq!(cfg.scalar("build-name"), Some("1.2.3.4567"));
    }

    #[test]
    fn malformed_line_is_a_syntax_error() {
        let content = "not-a-kv-line\n";
        assert!(matches!(Config::parse(content), Err(Error::ConfigSyntax(_))));
    }
}
