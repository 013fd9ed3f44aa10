//! Format-specific record extraction.
//!
//! Extractors are pure functions over a raw response body: no I/O, no retry, no sentinel
//! accounting beyond recognizing the literal fragments each upstream uses. The poller owns
//! everything stateful (when to stop, when to log, when to sleep).

/// Result of extracting zero or more identities from one raw upstream response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractOutcome {
    /// Identities found in this response, in the order they appeared.
    pub identities: Vec<String>,
    /// Whether this response is the sentinel that terminates the lazy sequence entirely.
    pub end_of_stream: bool,
    /// Whether this response failed the format-specific validity check and was dropped.
    pub malformed: bool,
}

impl ExtractOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn end() -> Self {
        Self {
            end_of_stream: true,
            ..Self::default()
        }
    }

    pub fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::default()
        }
    }

    pub fn ids(identities: Vec<String>) -> Self {
        Self {
            identities,
            ..Self::default()
        }
    }
}

/// A side's format-specific extraction contract (strictly format-guided: only payloads that
/// satisfy the format's validity check contribute identities — see the Open Question this
/// specification resolves in DESIGN.md).
pub trait Extractor: Send + Sync {
    fn extract(&self, raw: &str) -> ExtractOutcome;
}

/// Extractor for upstream source A: a JSON-ish record payload.
///
/// A record is valid only if the body contains the literal fragment `"status": "ok"`, in
/// which case the identity is the value of the first `"id": "<...>"` field. The literal
/// fragment `"status": "complete"` is the end-of-stream sentinel; anything else is malformed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceAExtractor;

impl Extractor for SourceAExtractor {
    fn extract(&self, raw: &str) -> ExtractOutcome {
        if raw.contains(r#""status": "complete""#) {
            return ExtractOutcome::end();
        }
        if !raw.contains(r#""status": "ok""#) {
            return ExtractOutcome::malformed();
        }
        match extract_first_id_field(raw) {
            Some(id) if !id.is_empty() => ExtractOutcome::ids(vec![id]),
            _ => ExtractOutcome::malformed(),
        }
    }
}

fn extract_first_id_field(raw: &str) -> Option<String> {
    let marker = r#""id": ""#;
    let start = raw.find(marker)? + marker.len();
    let end = raw[start..].find('"')? + start;
    Some(raw[start..end].to_string())
}

/// Extractor for upstream source B: an XML-ish attribute payload.
///
/// Each `value="<...>"` attribute in the body contributes one identity. The literal fragment
/// `<done/>` marks the end of records within that polling round (it does not end the overall
/// sequence — polling continues). The literal sentinel body `nothing else at the moment`
/// terminates the lazy sequence entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceBExtractor;

const SOURCE_B_END_SENTINEL: &str = "nothing else at the moment";

impl Extractor for SourceBExtractor {
    fn extract(&self, raw: &str) -> ExtractOutcome {
        let trimmed = raw.trim();
        if trimmed == SOURCE_B_END_SENTINEL {
            return ExtractOutcome::end();
        }

        let identities = extract_value_attrs(raw);
        if identities.is_empty() && !raw.contains("<done/>") {
            return ExtractOutcome::malformed();
        }
        ExtractOutcome::ids(identities)
    }
}

fn extract_value_attrs(raw: &str) -> Vec<String> {
    let marker = "value=\"";
    let mut ids = Vec::new();
    let mut rest = raw;
    while let Some(start) = rest.find(marker) {
        let after_marker = &rest[start + marker.len()..];
        match after_marker.find('"') {
            Some(end) => {
                let id = &after_marker[..end];
                if !id.is_empty() {
                    ids.push(id.to_string());
                }
                rest = &after_marker[end + 1..];
            }
            None => break,
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_a_valid_record() {
        let raw = r#"{"status": "ok", "id": "abc-123", "extra": 1}"#;
        let out = SourceAExtractor.extract(raw);
        assert_eq!(out.identities, vec!["abc-123".to_string()]);
        assert!(!out.end_of_stream);
        assert!(!out.malformed);
    }

    #[test]
    fn source_a_end_sentinel() {
        let raw = r#"{"status": "complete"}"#;
        let out = SourceAExtractor.extract(raw);
        assert!(out.end_of_stream);
        assert!(out.identities.is_empty());
    }

    #[test]
    fn source_a_malformed() {
        let out = SourceAExtractor.extract("not json at all");
        assert!(out.malformed);
        assert!(out.identities.is_empty());
    }

    #[test]
    fn source_a_ok_status_without_id_is_malformed() {
        let out = SourceAExtractor.extract(r#"{"status": "ok"}"#);
        assert!(out.malformed);
    }

    #[test]
    fn source_b_multiple_values() {
        let raw = r#"<records><r value="x"/><r value="y"/><done/></records>"#;
        let out = SourceBExtractor.extract(raw);
        assert_eq!(out.identities, vec!["x".to_string(), "y".to_string()]);
        assert!(!out.end_of_stream);
        assert!(!out.malformed);
    }

    #[test]
    fn source_b_empty_round_is_not_malformed() {
        let out = SourceBExtractor.extract("<done/>");
        assert!(!out.malformed);
        assert!(out.identities.is_empty());
        assert!(!out.end_of_stream);
    }

    #[test]
    fn source_b_end_sentinel() {
        let out = SourceBExtractor.extract("nothing else at the moment");
        assert!(out.end_of_stream);
        assert!(out.identities.is_empty());
    }

    #[test]
    fn source_b_malformed() {
        let out = SourceBExtractor.extract("garbage without markers");
        assert!(out.malformed);
    }
}
