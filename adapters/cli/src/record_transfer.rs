use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use thiserror::Error;
use virtu_lab_core::LabType;
use virtu_lab_system_reporting::SessionRecord;

const TRANSFER_DOMAIN: &str = "virtulab";
const TRANSFER_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Errors that can occur while decoding record transfer strings.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    #[error("transfer string is empty")]
    EmptyPayload,
    #[error("transfer string is missing its domain prefix")]
    MissingPrefix,
    #[error("transfer string is missing its version field")]
    MissingVersion,
    #[error("transfer string is missing its lab field")]
    MissingLab,
    #[error("transfer string is missing its payload")]
    MissingPayload,
    #[error("unrecognised domain prefix '{0}'")]
    InvalidPrefix(String),
    #[error("unsupported transfer version '{0}'")]
    UnsupportedVersion(String),
    #[error("unknown lab key '{0}'")]
    UnknownLab(String),
    #[error("header lab '{header}' does not match the payload lab '{payload}'")]
    LabMismatch {
        header: String,
        payload: String,
    },
    #[error("payload is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("payload is not a valid session record: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Encodes a session record into a single-line string suitable for
/// clipboard transfer to the persistence collaborator.
pub(crate) fn encode(record: &SessionRecord) -> String {
    let json = serde_json::to_vec(record).expect("session record serialization never fails");
    let encoded = STANDARD_NO_PAD.encode(json);
    format!(
        "{TRANSFER_DOMAIN}{FIELD_DELIMITER}{TRANSFER_VERSION}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{encoded}",
        record.lab.key()
    )
}

/// Decodes a session record from its transfer string representation.
pub(crate) fn decode(value: &str) -> Result<SessionRecord, TransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(TransferError::MissingPrefix)?;
    let version = parts.next().ok_or(TransferError::MissingVersion)?;
    let lab_key = parts.next().ok_or(TransferError::MissingLab)?;
    let payload = parts.next().ok_or(TransferError::MissingPayload)?;

    if domain != TRANSFER_DOMAIN {
        return Err(TransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(TransferError::UnsupportedVersion(version.to_owned()));
    }
    let header_lab =
        LabType::from_key(lab_key).ok_or_else(|| TransferError::UnknownLab(lab_key.to_owned()))?;

    let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
    let record: SessionRecord = serde_json::from_slice(&bytes)?;

    if record.lab != header_lab {
        return Err(TransferError::LabMismatch {
            header: lab_key.to_owned(),
            payload: record.lab.key().to_owned(),
        });
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, TransferError};
    use virtu_lab_core::{FailureKind, LabType};
    use virtu_lab_system_reporting::SessionRecord;

    fn sample_record() -> SessionRecord {
        SessionRecord {
            lab: LabType::Circuit,
            score: 80,
            duration_seconds: 45,
            mistakes: 1,
            failures: vec![FailureKind::Overload],
            observations: Vec::new(),
            prediction_accuracy: Some(92.5),
            challenge_completed: None,
        }
    }

    #[test]
    fn records_round_trip_through_the_transfer_string() {
        let record = sample_record();
        let encoded = encode(&record);
        assert!(encoded.starts_with("virtulab:v1:circuit:"));
        let decoded = decode(&encoded).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn empty_strings_are_rejected() {
        assert!(matches!(decode("  "), Err(TransferError::EmptyPayload)));
    }

    #[test]
    fn foreign_domains_are_rejected() {
        let tampered = encode(&sample_record()).replace("virtulab", "maze");
        assert!(matches!(
            decode(&tampered),
            Err(TransferError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn future_versions_are_rejected() {
        let tampered = encode(&sample_record()).replace(":v1:", ":v9:");
        assert!(matches!(
            decode(&tampered),
            Err(TransferError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn corrupt_payloads_are_rejected() {
        let encoded = encode(&sample_record());
        let truncated = &encoded[..encoded.len() - 10];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn mismatched_lab_headers_are_rejected() {
        let tampered = encode(&sample_record()).replacen("circuit", "titration", 1);
        assert!(matches!(
            decode(&tampered),
            Err(TransferError::LabMismatch { .. })
        ));
    }
}
