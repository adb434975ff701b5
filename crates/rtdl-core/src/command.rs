//! Command grammar
//!
//! `help | start | stats | download <ref> | dl <ref> | downloading |
//! status_<gid> | cancel_<gid> | dl_<hash> | clean | ip | time`
//!
//! The verb is matched case-insensitively and may carry a leading `/` (the
//! Telegram convention). Arguments keep their original case.

use crate::error::RtdlError;
use once_cell::sync::Lazy;
use regex::Regex;
use rtdl_types::ReferenceKind;

static MAGNET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"magnet:\?xt=urn:btih:[a-zA-Z0-9]+[^"\s]*"#).expect("valid magnet regex"));

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[\w\-./?#&=:%]+").expect("valid url regex"));

/// A parsed inbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Start,
    Stats,
    /// `download`/`dl`; the rest of the message, if any
    Download(Option<String>),
    Downloading,
    Status(String),
    Cancel(String),
    /// `dl_<hash>`, expanded to a magnet reference
    DownloadHash(String),
    Clean,
    Ip,
    Time,
    Unknown(String),
}

impl Command {
    /// Parse a trimmed message into a command
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (verb_raw, rest) = match text.find(char::is_whitespace) {
            Some(idx) => (&text[..idx], text[idx..].trim()),
            None => (text, ""),
        };
        let verb_raw = verb_raw.strip_prefix('/').unwrap_or(verb_raw);
        let verb = verb_raw.to_lowercase();
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match verb.as_str() {
            "help" => Command::Help,
            "start" => Command::Start,
            "stats" => Command::Stats,
            "download" | "dl" => Command::Download(arg),
            "downloading" => Command::Downloading,
            "clean" => Command::Clean,
            "ip" => Command::Ip,
            "time" => Command::Time,
            _ => {
                if let Some(gid) = suffix_arg(verb_raw, "status_") {
                    Command::Status(gid)
                } else if let Some(gid) = suffix_arg(verb_raw, "cancel_") {
                    Command::Cancel(gid)
                } else if let Some(hash) = suffix_arg(verb_raw, "dl_") {
                    Command::DownloadHash(hash)
                } else {
                    Command::Unknown(verb)
                }
            }
        }
    }

    /// Name used in results and logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Start => "start",
            Command::Stats => "stats",
            Command::Download(_) | Command::DownloadHash(_) => "download",
            Command::Downloading => "downloading",
            Command::Status(_) => "status",
            Command::Cancel(_) => "cancel",
            Command::Clean => "clean",
            Command::Ip => "ip",
            Command::Time => "time",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// Argument after a case-insensitive `prefix`, up to the next underscore
fn suffix_arg(verb: &str, prefix: &str) -> Option<String> {
    let head = verb.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let tail = &verb[prefix.len()..];
    Some(tail.split('_').next().unwrap_or_default().to_string())
}

/// Canonical magnet reference for a bare info-hash
pub fn magnet_from_hash(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{}", hash)
}

/// Find a download reference in free text
///
/// A magnet link always wins over an http(s) URL, wherever they appear.
pub fn extract_reference(input: &str) -> Result<(ReferenceKind, String), RtdlError> {
    if let Some(m) = MAGNET_RE.find(input) {
        return Ok((ReferenceKind::Magnet, m.as_str().to_string()));
    }
    if let Some(m) = URL_RE.find(input) {
        return Ok((ReferenceKind::Url, m.as_str().to_string()));
    }
    Err(RtdlError::InvalidReference(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("/HELP"), Command::Help);
        assert_eq!(Command::parse("Start"), Command::Start);
        assert_eq!(Command::parse("stats"), Command::Stats);
        assert_eq!(Command::parse("downloading"), Command::Downloading);
        assert_eq!(Command::parse("/clean"), Command::Clean);
        assert_eq!(Command::parse("ip"), Command::Ip);
        assert_eq!(Command::parse("time"), Command::Time);
    }

    #[test]
    fn test_parse_download_keeps_argument_case() {
        assert_eq!(
            Command::parse("DL   http://Example.com/File.iso"),
            Command::Download(Some("http://Example.com/File.iso".to_string()))
        );
        assert_eq!(Command::parse("/download"), Command::Download(None));
        assert_eq!(Command::parse("dl   "), Command::Download(None));
    }

    #[test]
    fn test_parse_suffixed_verbs() {
        assert_eq!(
            Command::parse("/status_2089b05ecca3d829"),
            Command::Status("2089b05ecca3d829".to_string())
        );
        assert_eq!(Command::parse("CANCEL_abc"), Command::Cancel("abc".to_string()));
        assert_eq!(
            Command::parse("dl_ABCDEF0123"),
            Command::DownloadHash("ABCDEF0123".to_string())
        );
        assert_eq!(Command::parse("dl_"), Command::DownloadHash(String::new()));
        assert_eq!(Command::parse("status_abc_extra"), Command::Status("abc".to_string()));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Command::parse("/Foo bar"), Command::Unknown("foo".to_string()));
        assert_eq!(Command::parse("statusabc"), Command::Unknown("statusabc".to_string()));
    }

    #[test]
    fn test_magnet_wins_over_url() {
        let (kind, reference) =
            extract_reference("grab this magnet:?xt=urn:btih:ABCD and also http://x/y").unwrap();
        assert_eq!(kind, ReferenceKind::Magnet);
        assert_eq!(reference, "magnet:?xt=urn:btih:ABCD");

        let (kind, _) = extract_reference("http://x/y then magnet:?xt=urn:btih:ABCD").unwrap();
        assert_eq!(kind, ReferenceKind::Magnet);
    }

    #[test]
    fn test_magnet_keeps_trailing_parameters() {
        let (_, reference) =
            extract_reference("magnet:?xt=urn:btih:ABCD&dn=Some.Name&tr=udp://t:80").unwrap();
        assert_eq!(reference, "magnet:?xt=urn:btih:ABCD&dn=Some.Name&tr=udp://t:80");
    }

    #[test]
    fn test_url_only() {
        let (kind, reference) = extract_reference("please get https://example.com/a.iso?x=1 now").unwrap();
        assert_eq!(kind, ReferenceKind::Url);
        assert_eq!(reference, "https://example.com/a.iso?x=1");
    }

    #[test]
    fn test_no_reference() {
        let result = extract_reference("ftp://nope and magnet:?xt=urn:sha1:abc");
        assert!(matches!(result, Err(RtdlError::InvalidReference(_))));
    }

    #[test]
    fn test_magnet_from_hash() {
        assert_eq!(magnet_from_hash("ABCD123"), "magnet:?xt=urn:btih:ABCD123");
    }
}
