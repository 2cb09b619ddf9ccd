//! Mirror and metadata lookup.
//!
//! The project runs a small service that returns a plaintext document with
//! nearby package mirrors and a few `KEY=value` hints, most importantly the
//! timezone the requesting host appears to be in. The fetch is optional: any
//! failure falls back to [`FtpList::empty`] and the installation carries on.

use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;

use crate::process::Cmd;

/// Default endpoint for the mirror/metadata listing.
pub const DEFAULT_URL: &str = "http://129.128.5.191/cgi-bin/ftplist.cgi";

/// How many mirrors we keep from the response.
const MAX_MIRRORS: usize = 2;

/// Parsed mirror/metadata listing.
#[derive(Debug, Clone)]
pub struct FtpList {
    raw_text: String,
    mirrors: Vec<(String, String)>,
    aux_data: HashMap<String, String>,
}

impl FtpList {
    /// Fetch and parse the listing from `url`.
    pub fn load(url: &str) -> Result<Self> {
        let result = Cmd::new("curl")
            .args(["-fsS", url])
            .error_msg("mirror list fetch failed")
            .run()?;
        Ok(Self::parse(&result.stdout))
    }

    /// Parse a listing from raw response text.
    ///
    /// Two independent line families are extracted: mirror lines
    /// (`<url> <description>`, capped to the first two) and `KEY=value`
    /// auxiliary lines.
    pub fn parse(text: &str) -> Self {
        let mirror_line = Regex::new(r"(?m)^(https?://\S+)\s+([^\n]*)$").expect("static regex");
        let aux_line = Regex::new(r"(?m)^([A-Z_]+)=([^\n]+)$").expect("static regex");

        let mut mirrors: Vec<(String, String)> = mirror_line
            .captures_iter(text)
            .map(|capture| (capture[1].to_string(), capture[2].to_string()))
            .collect();
        mirrors.truncate(MAX_MIRRORS);

        let aux_data = aux_line
            .captures_iter(text)
            .map(|capture| (capture[1].to_string(), capture[2].to_string()))
            .collect();

        Self {
            raw_text: text.to_string(),
            mirrors,
            aux_data,
        }
    }

    /// Fallback listing with two well-known mirrors and no metadata.
    pub fn empty() -> Self {
        Self {
            raw_text: String::new(),
            mirrors: vec![
                (
                    "http://ftp5.usa.openbsd.org/pub/OpenBSD".to_string(),
                    "Redwood City, CA, USA".to_string(),
                ),
                (
                    "http://mirrors.sonic.net/pub/OpenBSD".to_string(),
                    "San Francisco, CA, USA".to_string(),
                ),
            ],
            aux_data: HashMap::new(),
        }
    }

    /// The selected mirrors as `(url, description)` pairs.
    pub fn mirrors(&self) -> &[(String, String)] {
        &self.mirrors
    }

    /// Colon-joined package-path form of the mirror list, suitable for
    /// `PKG_PATH`.
    pub fn package_mirrors(&self) -> String {
        self.mirrors
            .iter()
            .map(|(url, _)| format!("{url}/%c/packages/%a"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Look up an auxiliary `KEY=value` field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.aux_data.get(key).map(String::as_str)
    }

    /// The timezone the service guessed for this host, or `""` if it sent
    /// none.
    pub fn tz(&self) -> &str {
        self.get("TZ").unwrap_or("")
    }

    /// The raw response text.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
http://mirror-one.example.org/pub/OpenBSD Oslo, Norway
http://mirror-two.example.org/pub/OpenBSD Stockholm, Sweden
http://mirror-three.example.org/pub/OpenBSD Helsinki, Finland
TZ=Europe/Oslo
REMOTE_ADDR=192.0.2.7
";

    #[test]
    fn keeps_only_the_first_two_mirrors() {
        let list = FtpList::parse(SAMPLE);
        assert_eq!(list.mirrors().len(), 2);
        assert_eq!(list.mirrors()[0].0, "http://mirror-one.example.org/pub/OpenBSD");
        assert_eq!(list.mirrors()[1].1, "Stockholm, Sweden");
    }

    #[test]
    fn parses_auxiliary_fields() {
        let list = FtpList::parse(SAMPLE);
        assert_eq!(list.tz(), "Europe/Oslo");
        assert_eq!(list.get("REMOTE_ADDR"), Some("192.0.2.7"));
        assert_eq!(list.get("MISSING"), None);
    }

    #[test]
    fn package_mirrors_are_colon_joined() {
        let list = FtpList::parse(SAMPLE);
        assert_eq!(
            list.package_mirrors(),
            "http://mirror-one.example.org/pub/OpenBSD/%c/packages/%a:\
             http://mirror-two.example.org/pub/OpenBSD/%c/packages/%a"
        );
    }

    #[test]
    fn empty_fallback_has_two_mirrors_and_no_tz() {
        let list = FtpList::empty();
        assert_eq!(list.mirrors().len(), 2);
        assert_eq!(list.tz(), "");
        assert_eq!(list.raw_text(), "");
    }

    #[test]
    fn parse_tolerates_unrelated_text() {
        let list = FtpList::parse("hello\nworld\n");
        assert!(list.mirrors().is_empty());
        assert_eq!(list.tz(), "");
    }
}
