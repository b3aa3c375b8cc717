use crate::domain::ExtractedValues;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonPolicy {
    /// Compare every field and report all failures.
    #[default]
    SoftCheck,
    /// Stop at the first failing field.
    StopOnFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparedField {
    Plaquette,
    ChecksumRng,
    ChecksumLat,
}

impl ComparedField {
    pub const ALL: [Self; 3] = [Self::Plaquette, Self::ChecksumRng, Self::ChecksumLat];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Plaquette => "plaquette",
            Self::ChecksumRng => "Checksum RNG file",
            Self::ChecksumLat => "Checksum LAT file",
        }
    }
}

impl Display for ComparedField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: ComparedField,
    pub actual: String,
    pub expected: String,
    pub passed: bool,
}

impl FieldComparison {
    pub fn failure_message(&self) -> Option<String> {
        (!self.passed).then(|| {
            format!(
                "{} comparison failed: actual={} , expected={}",
                self.field, self.actual, self.expected
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub policy: ComparisonPolicy,
    pub passed: bool,
    pub fields: Vec<FieldComparison>,
}

impl ComparisonReport {
    pub fn field(&self, field: ComparedField) -> Option<&FieldComparison> {
        self.fields.iter().find(|comparison| comparison.field == field)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldComparison> {
        self.fields.iter().filter(|comparison| !comparison.passed)
    }
}

/// Compares actual against expected values field by field. The plaquette is
/// compared with exact `f64` equality: this is a bit-for-bit reproducibility
/// check, not a tolerance check.
pub fn compare_values(
    actual: &ExtractedValues,
    expected: &ExtractedValues,
    policy: ComparisonPolicy,
) -> ComparisonReport {
    let mut fields = Vec::with_capacity(ComparedField::ALL.len());
    for field in ComparedField::ALL {
        let comparison = compare_field(field, actual, expected);
        let failed = !comparison.passed;
        if let Some(message) = comparison.failure_message() {
            warn!("{}", message);
        }
        fields.push(comparison);

        if failed && policy == ComparisonPolicy::StopOnFailure {
            break;
        }
    }

    ComparisonReport {
        policy,
        passed: fields.iter().all(|comparison| comparison.passed),
        fields,
    }
}

fn compare_field(
    field: ComparedField,
    actual: &ExtractedValues,
    expected: &ExtractedValues,
) -> FieldComparison {
    let (actual_text, expected_text, passed) = match field {
        ComparedField::Plaquette => (
            actual.plaquette.to_string(),
            expected.plaquette.to_string(),
            actual.plaquette == expected.plaquette,
        ),
        ComparedField::ChecksumRng => (
            actual.checksum_rng.clone(),
            expected.checksum_rng.clone(),
            actual.checksum_rng == expected.checksum_rng,
        ),
        ComparedField::ChecksumLat => (
            actual.checksum_lat.clone(),
            expected.checksum_lat.clone(),
            actual.checksum_lat == expected.checksum_lat,
        ),
    };

    FieldComparison {
        field,
        actual: actual_text,
        expected: expected_text,
        passed,
    }
}
