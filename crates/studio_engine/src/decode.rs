use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// How the sheet encoding was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    ByteOrderMark,
    ContentType,
    Detected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
    pub source: EncodingSource,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}: {message}")]
    DecodeFailure { encoding: String, message: String },
}

/// Decode an exported sheet into UTF-8.
///
/// Precedence: byte order mark, then the Content-Type charset, then chardetng.
/// An unknown charset label falls through to detection.
pub fn decode_text(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedText, DecodeError> {
    let (encoding, source) = choose_encoding(bytes, content_type);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::DecodeFailure {
            encoding: encoding.name().to_string(),
            message: "malformed byte sequence".into(),
        });
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: encoding.name().to_string(),
        source,
    })
}

fn choose_encoding(bytes: &[u8], content_type: Option<&str>) -> (&'static Encoding, EncodingSource) {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return (encoding, EncodingSource::ByteOrderMark);
    }
    let declared = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    if let Some(encoding) = declared {
        return (encoding, EncodingSource::ContentType);
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    (detector.guess(None, true), EncodingSource::Detected)
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches(&[' ', '"', '\''][..]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_wins_over_header() {
        let bytes = b"\xEF\xBB\xBFName,Prompt\n";
        let decoded = decode_text(bytes, Some("text/csv; charset=windows-1252")).unwrap();
        assert_eq!(decoded.encoding_label, "UTF-8");
        assert_eq!(decoded.source, EncodingSource::ByteOrderMark);
        assert_eq!(decoded.text, "Name,Prompt\n");
    }

    #[test]
    fn header_charset_is_used() {
        // "Café" in windows-1252
        let bytes = b"Caf\xE9";
        let decoded = decode_text(bytes, Some("text/csv; Charset=\"windows-1252\"")).unwrap();
        assert_eq!(decoded.text, "Café");
        assert_eq!(decoded.source, EncodingSource::ContentType);
    }

    #[test]
    fn invalid_utf8_under_declared_utf8_fails() {
        let err = decode_text(b"ab\x80cd", Some("text/csv; charset=utf-8")).unwrap_err();
        assert!(matches!(err, DecodeError::DecodeFailure { .. }));
    }
}
