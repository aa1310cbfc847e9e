use lazy_static::lazy_static;
use regex::Regex;

use crate::Error;

lazy_static! {
    static ref DATABASE_ID: Regex = Regex::new(r"([0-9a-fA-F]{32})$").unwrap();
}

const TOKEN_PREFIXES: &[&str] = &["secret_", "ntn_"];

/// A validated reference to a hosted database, carrying the 32-hex
/// identifier extracted from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    pub id: String,
}

/// Integration tokens carry a fixed prefix; anything else is either a typo or
/// a token of the wrong kind, and fails fast before any request is made.
pub fn validate_token(token: &str) -> Result<(), Error> {
    if TOKEN_PREFIXES.iter().any(|p| token.starts_with(p)) {
        Ok(())
    } else {
        Err(Error::InvalidToken)
    }
}

/// Validates that `raw` is an HTTPS URL of the hosted service pointing at a
/// database view, and extracts the database identifier. Page URLs (no view
/// marker) and foreign domains are rejected.
pub fn parse_database_url(raw: &str) -> Result<DatabaseRef, Error> {
    let invalid = |reason: &'static str| Error::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = url::Url::parse(raw).map_err(|_| invalid("not a valid URL"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let on_service = host == "notion.so"
        || host.ends_with(".notion.so")
        || host == "notion.site"
        || host.ends_with(".notion.site");
    if !on_service {
        return Err(invalid("not a notion.so or notion.site URL"));
    }

    // A database view URL ends its path with the database id (optionally
    // prefixed by a slug) and carries a `v=` query parameter naming the view.
    // Plain page URLs have no view parameter.
    if !url.query_pairs().any(|(k, _)| k == "v") {
        return Err(invalid("URL is a page, not a database view"));
    }

    let last_segment = url
        .path_segments()
        .and_then(|segments| segments.last().map(str::to_string))
        .ok_or_else(|| invalid("missing path"))?;
    // Strip a leading "Name-" slug if present.
    let tail = last_segment.rsplit('-').next().unwrap_or(&last_segment);

    let id = DATABASE_ID
        .captures(tail)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .ok_or_else(|| invalid("no database id in URL path"))?;

    Ok(DatabaseRef { id })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_prefixes() {
        assert!(validate_token("secret_abc123").is_ok());
        assert!(validate_token("ntn_abc123").is_ok());
        assert!(validate_token("sk-ant-nope").is_err());
        assert!(validate_token("").is_err());
    }

    #[test]
    fn database_view_urls_are_accepted() {
        let id = "0123456789abcdef0123456789abcdef";
        for raw in [
            format!("https://www.notion.so/workspace/Tasks-{id}?v=aaaa"),
            format!("https://notion.so/{id}?v=aaaa&pvs=4"),
            format!("https://team.notion.site/{id}?v=aaaa"),
        ] {
            let parsed = parse_database_url(&raw).expect(&raw);
            assert_eq!(id, parsed.id);
        }
    }

    #[test]
    fn page_urls_and_foreign_domains_are_rejected() {
        let id = "0123456789abcdef0123456789abcdef";
        for raw in [
            format!("https://www.notion.so/workspace/Tasks-{id}"),
            format!("https://example.com/{id}?v=aaaa"),
            format!("ftp://www.notion.so/{id}?v=aaaa"),
            "https://www.notion.so/workspace/?v=aaaa".to_string(),
            "not a url".to_string(),
        ] {
            assert!(parse_database_url(&raw).is_err(), "must reject {raw}");
        }
    }
}
