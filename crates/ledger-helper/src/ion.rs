//! Ion text payloads exchanged with the ledger service.
//!
//! The service hands block addresses, revisions and proofs back as
//! [`ValueHolder`]s carrying Ion text. Only block addresses are ever read
//! locally, to pull out their sequence number. They are rendered in the
//! compact form the service emits:
//!
//! ```text
//! {strandId:"JdxjkR9bSYB5jMHWcI464T",sequenceNo:14}
//! ```
//!
//! Everything else stays opaque.

use ion_rs::Element;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wrapper for an Ion text payload, as the service's API shapes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValueHolder {
    /// The Ion text.
    pub ion_text: String,
}

impl ValueHolder {
    /// Wraps Ion text.
    #[must_use]
    pub fn new(ion_text: impl Into<String>) -> Self {
        Self { ion_text: ion_text.into() }
    }
}

impl From<&BlockAddress> for ValueHolder {
    fn from(address: &BlockAddress) -> Self {
        Self::new(address.to_ion_text())
    }
}

/// Location of a journal block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockAddress {
    /// Journal strand the block lives on.
    pub strand_id: String,
    /// Position of the block within the strand.
    pub sequence_no: u64,
}

impl BlockAddress {
    /// Creates a block address.
    #[must_use]
    pub fn new(strand_id: impl Into<String>, sequence_no: u64) -> Self {
        Self { strand_id: strand_id.into(), sequence_no }
    }

    /// Reads a block address from the Ion text of a [`ValueHolder`].
    ///
    /// # Errors
    ///
    /// Returns [`IonReadError`] if the text is not a single Ion struct, or if
    /// `strandId` or a non-negative integer `sequenceNo` is missing.
    pub fn from_value_holder(holder: &ValueHolder) -> Result<Self, IonReadError> {
        Self::from_ion_text(&holder.ion_text)
    }

    /// Reads a block address from Ion text.
    ///
    /// # Errors
    ///
    /// See [`BlockAddress::from_value_holder`].
    pub fn from_ion_text(text: &str) -> Result<Self, IonReadError> {
        let element = Element::read_one(text)
            .map_err(|e| IonReadError::Syntax { message: e.to_string() })?;
        let fields = element.as_struct().ok_or_else(|| IonReadError::Syntax {
            message: format!("expected a struct, got {}", element.ion_type()),
        })?;

        let Some(strand_id) = fields.get("strandId") else {
            return Err(IonReadError::field("strandId", "missing"));
        };
        let strand_id = strand_id.as_text().ok_or_else(|| {
            IonReadError::field("strandId", format!("expected text, got {strand_id}"))
        })?;

        let Some(sequence_no) = fields.get("sequenceNo") else {
            return Err(IonReadError::field("sequenceNo", "missing"));
        };
        let sequence_no = sequence_no.as_int().ok_or_else(|| {
            IonReadError::field("sequenceNo", format!("expected integer, got {sequence_no}"))
        })?;
        let sequence_no = sequence_no
            .as_i128()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| {
                IonReadError::field("sequenceNo", format!("out of range for u64: {sequence_no}"))
            })?;

        Ok(Self::new(strand_id, sequence_no))
    }

    /// Renders the address in the service's Ion text form.
    #[must_use]
    pub fn to_ion_text(&self) -> String {
        let mut out = String::with_capacity(self.strand_id.len() + 40);
        out.push_str("{strandId:");
        push_quoted(&mut out, &self.strand_id);
        out.push_str(",sequenceNo:");
        out.push_str(&self.sequence_no.to_string());
        out.push('}');
        out
    }
}

/// Failure to read an Ion payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IonReadError {
    /// The text is not a single Ion struct.
    #[error("malformed Ion: {message}")]
    Syntax {
        /// The reader's description of the problem.
        message: String,
    },

    /// A field is missing or has the wrong type.
    #[error("field '{field}': {message}")]
    Field {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl IonReadError {
    fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Field { field, message: message.into() }
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_reads_service_block_address() {
        let holder = ValueHolder::new("{strandId:\"JdxjkR9bSYB5jMHWcI464T\",sequenceNo:14}");
        let address = BlockAddress::from_value_holder(&holder).unwrap();

        assert_eq!(address, BlockAddress::new("JdxjkR9bSYB5jMHWcI464T", 14));
    }

    #[test]
    fn test_reads_spaced_and_reordered_fields() {
        let text = "  { sequenceNo : 1_024 ,\n strandId : 'KHtn8Ay2QuS4f1E7PLbvbL' , }  ";
        let address = BlockAddress::from_ion_text(text).unwrap();

        assert_eq!(address.sequence_no, 1024);
        assert_eq!(address.strand_id, "KHtn8Ay2QuS4f1E7PLbvbL");
    }

    #[test]
    fn test_reads_json_shaped_address() {
        let address =
            BlockAddress::from_ion_text(r#"{"strandId": "abc", "sequenceNo": 7}"#).unwrap();
        assert_eq!(address, BlockAddress::new("abc", 7));
    }

    #[test]
    fn test_ignores_unrelated_fields() {
        let address =
            BlockAddress::from_ion_text("{extra:null,strandId:\"s\",flag:true,sequenceNo:3}")
                .unwrap();
        assert_eq!(address, BlockAddress::new("s", 3));
    }

    #[test]
    fn test_reads_annotated_address_with_comments_and_escapes() {
        let text = "block::{ /* tip */ strandId: \"\\x41b\\u0063\", // strand\n sequenceNo: 0x10 }";
        let address = BlockAddress::from_ion_text(text).unwrap();

        assert_eq!(address, BlockAddress::new("Abc", 16));
    }

    #[test]
    fn test_reads_long_string_strand() {
        let address =
            BlockAddress::from_ion_text("{strandId:'''ab''' '''cd''',sequenceNo:2}").unwrap();
        assert_eq!(address.strand_id, "abcd");
    }

    #[test]
    fn test_reads_sequence_number_above_i64_max() {
        let address = BlockAddress::new("s", u64::MAX);
        let read = BlockAddress::from_ion_text(&address.to_ion_text()).unwrap();
        assert_eq!(read.sequence_no, u64::MAX);
    }

    #[test]
    fn test_string_escapes() {
        let address =
            BlockAddress::from_ion_text(r#"{strandId:"a\"b\\c",sequenceNo:0}"#).unwrap();
        assert_eq!(address.strand_id, "a\"b\\c");
    }

    #[rstest]
    #[case::empty("")]
    #[case::not_a_struct("14")]
    #[case::unterminated("{strandId:\"abc,sequenceNo:1}")]
    #[case::missing_colon("{strandId \"abc\",sequenceNo:1}")]
    #[case::trailing("{strandId:\"a\",sequenceNo:1} extra")]
    fn test_syntax_errors(#[case] text: &str) {
        let err = BlockAddress::from_ion_text(text).unwrap_err();
        assert!(matches!(err, IonReadError::Syntax { .. }), "{text:?} gave {err:?}");
    }

    #[rstest]
    #[case::missing_sequence("{strandId:\"a\"}", "sequenceNo")]
    #[case::missing_strand("{sequenceNo:1}", "strandId")]
    #[case::negative_sequence("{strandId:\"a\",sequenceNo:-1}", "sequenceNo")]
    #[case::beyond_u64("{strandId:\"a\",sequenceNo:18446744073709551616}", "sequenceNo")]
    #[case::nested_sequence("{strandId:\"a\",sequenceNo:{x:1}}", "sequenceNo")]
    #[case::decimal_sequence("{strandId:\"a\",sequenceNo:1.5}", "sequenceNo")]
    #[case::null_sequence("{strandId:\"a\",sequenceNo:null.int}", "sequenceNo")]
    #[case::string_sequence("{strandId:\"a\",sequenceNo:\"1\"}", "sequenceNo")]
    #[case::int_strand("{strandId:5,sequenceNo:1}", "strandId")]
    fn test_field_errors(#[case] text: &str, #[case] expected_field: &str) {
        match BlockAddress::from_ion_text(text).unwrap_err() {
            IonReadError::Field { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected field error, got {other:?}"),
        }
    }

    #[test]
    fn test_value_holder_serializes_pascal_case() {
        let holder = ValueHolder::from(&BlockAddress::new("s", 9));
        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json, serde_json::json!({ "IonText": "{strandId:\"s\",sequenceNo:9}" }));
    }

    proptest! {
        /// Rendering an address and reading it back must give the same address.
        #[test]
        fn rendered_address_reads_back(
            strand in "[A-Za-z0-9\"\\\\ ]{0,32}",
            sequence_no in any::<u64>(),
        ) {
            let address = BlockAddress::new(strand, sequence_no);
            let read = BlockAddress::from_ion_text(&address.to_ion_text())
                .expect("rendered address should read back");
            prop_assert_eq!(read, address);
        }

        /// Arbitrary input is rejected, never a panic.
        #[test]
        fn reader_never_panics(text in "\\PC{0,64}") {
            let _ = BlockAddress::from_ion_text(&text);
        }
    }
}
