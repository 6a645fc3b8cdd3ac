//! Three-character segment identifiers and the standard catalogue.

use std::fmt;

use phf::phf_map;

use crate::error::{Error, Result};

/// Identifiers whose second field is the delimiter declaration.
pub const HEADER_IDS: [&str; 3] = ["MSH", "BHS", "FHS"];

/// Reserved first letter of site-defined segments.
pub const CUSTOM_PREFIX: char = 'Z';

/// Standard segment identifiers and their names.
static CATALOGUE: phf::Map<&'static str, &'static str> = phf_map! {
    "ACC" => "Accident",
    "AIG" => "Appointment Information - General Resource",
    "AIL" => "Appointment Information - Location Resource",
    "AIP" => "Appointment Information - Personnel Resource",
    "AIS" => "Appointment Information - Service",
    "AL1" => "Patient Allergy Information",
    "BHS" => "Batch Header",
    "BLG" => "Billing",
    "BTS" => "Batch Trailer",
    "CTD" => "Contact Data",
    "DB1" => "Disability",
    "DG1" => "Diagnosis",
    "DRG" => "Diagnosis Related Group",
    "DSC" => "Continuation Pointer",
    "ERR" => "Error",
    "EVN" => "Event Type",
    "FHS" => "File Header",
    "FT1" => "Financial Transaction",
    "FTS" => "File Trailer",
    "GT1" => "Guarantor",
    "IN1" => "Insurance",
    "IN2" => "Insurance Additional Information",
    "IN3" => "Insurance Additional Information, Certification",
    "MFE" => "Master File Entry",
    "MFI" => "Master File Identification",
    "MRG" => "Merge Patient Information",
    "MSA" => "Message Acknowledgment",
    "MSH" => "Message Header",
    "NK1" => "Next of Kin / Associated Parties",
    "NTE" => "Notes and Comments",
    "OBR" => "Observation Request",
    "OBX" => "Observation/Result",
    "ORC" => "Common Order",
    "PD1" => "Patient Additional Demographic",
    "PID" => "Patient Identification",
    "PR1" => "Procedures",
    "PRD" => "Provider Data",
    "PV1" => "Patient Visit",
    "PV2" => "Patient Visit - Additional Information",
    "QAK" => "Query Acknowledgment",
    "QPD" => "Query Parameter Definition",
    "QRD" => "Original-Style Query Definition",
    "QRF" => "Original-Style Query Filter",
    "RCP" => "Response Control Parameter",
    "RGS" => "Resource Group",
    "ROL" => "Role",
    "RXA" => "Pharmacy/Treatment Administration",
    "RXC" => "Pharmacy/Treatment Component Order",
    "RXE" => "Pharmacy/Treatment Encoded Order",
    "RXO" => "Pharmacy/Treatment Order",
    "RXR" => "Pharmacy/Treatment Route",
    "SCH" => "Scheduling Activity Information",
    "SFT" => "Software Segment",
    "SPM" => "Specimen",
    "TQ1" => "Timing/Quantity",
    "TXA" => "Transcription Document Header",
    "UB1" => "UB82",
    "UB2" => "Uniform Billing Data",
};

/// A validated segment identifier: exactly three ASCII alphanumerics.
///
/// Stored inline, so identifiers are `Copy` and need no interning.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId([u8; 3]);

impl SegmentId {
    /// Validate a 3-character identifier.
    pub fn new(id: &str) -> Result<Self> {
        match id.as_bytes() {
            &[a, b, c] if [a, b, c].iter().all(u8::is_ascii_alphanumeric) => {
                Ok(SegmentId([a, b, c]))
            }
            _ => Err(Error::InvalidSegmentIdentifier(id.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII alphanumerics are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// `MSH`, `BHS` or `FHS`.
    pub fn is_header(&self) -> bool {
        HEADER_IDS.contains(&self.as_str())
    }

    pub fn is_message_header(&self) -> bool {
        &self.0 == b"MSH"
    }

    /// Site-defined `Z` segment.
    pub fn is_custom(&self) -> bool {
        self.0[0] == CUSTOM_PREFIX as u8
    }

    /// Listed in the standard catalogue.
    pub fn is_standard(&self) -> bool {
        CATALOGUE.contains_key(self.as_str())
    }

    /// Conventional shape: an uppercase letter followed by uppercase letters
    /// or digits.
    pub fn is_conventional(&self) -> bool {
        self.0[0].is_ascii_uppercase()
            && self.0[1..]
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    /// Catalogue name, for example `"Patient Identification"` for `PID`.
    pub fn description(&self) -> Option<&'static str> {
        CATALOGUE.get(self.as_str()).copied()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentId({})", self.as_str())
    }
}

impl PartialEq<str> for SegmentId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for SegmentId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl TryFrom<&str> for SegmentId {
    type Error = Error;

    fn try_from(id: &str) -> Result<Self> {
        SegmentId::new(id)
    }
}
