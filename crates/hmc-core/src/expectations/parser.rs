use crate::domain::{
    ExecutionMode, ExpectationKey, ExpectationRow, ExpectedRunParameters, ExtractedValues,
};

pub(super) const BASIC_FIELD_COUNT: usize = 5;
pub(super) const EXTENDED_FIELD_COUNT: usize = 10;

/// Layout of one expectations row, selected by the kind of key used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationFormat {
    /// `grid mpi plaquette checksum_rng checksum_lat`
    Basic,
    /// `line_index grid mpi nthreads MDsteps trajL CPU|GPU plaquette checksum_rng checksum_lat`
    Extended,
}

impl ExpectationFormat {
    pub const fn for_key(key: &ExpectationKey) -> Self {
        match key {
            ExpectationKey::Configuration { .. } => Self::Basic,
            ExpectationKey::Line { .. } => Self::Extended,
        }
    }

    pub const fn field_count(self) -> usize {
        match self {
            Self::Basic => BASIC_FIELD_COUNT,
            Self::Extended => EXTENDED_FIELD_COUNT,
        }
    }
}

pub(super) fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

pub(super) fn key_matches(fields: &[&str], key: &ExpectationKey) -> bool {
    match key {
        ExpectationKey::Configuration { grid, mpi } => {
            fields.len() >= 2 && fields[0] == grid.as_str() && fields[1] == mpi.as_str()
        }
        ExpectationKey::Line { index } => fields
            .first()
            .and_then(|token| token.parse::<usize>().ok())
            .is_some_and(|line_index| line_index == *index),
    }
}

/// Parses a whitespace-separated row in the layout implied by `key`.
/// The caller has already checked that the leading fields match the key.
pub fn parse_expectation_line(
    line: &str,
    key: &ExpectationKey,
    source_line: usize,
) -> Result<ExpectationRow, String> {
    let fields = line.split_whitespace().collect::<Vec<_>>();
    let format = ExpectationFormat::for_key(key);
    if fields.len() != format.field_count() {
        return Err(format!(
            "expected {} fields, found {}",
            format.field_count(),
            fields.len()
        ));
    }

    match format {
        ExpectationFormat::Basic => Ok(ExpectationRow {
            key: key.clone(),
            grid: fields[0].to_string(),
            mpi: fields[1].to_string(),
            parameters: None,
            values: parse_values(&fields[2..])?,
            source_line,
        }),
        ExpectationFormat::Extended => {
            let threads = parse_field::<u32>(fields[3], "nthreads")?;
            let md_steps = parse_field::<u32>(fields[4], "MDsteps")?;
            let trajectory_length = parse_field::<f64>(fields[5], "trajL")?;
            let mode = ExecutionMode::from_token(fields[6]).ok_or_else(|| {
                format!("invalid execution mode '{}'; expected CPU or GPU", fields[6])
            })?;

            Ok(ExpectationRow {
                key: key.clone(),
                grid: fields[1].to_string(),
                mpi: fields[2].to_string(),
                parameters: Some(ExpectedRunParameters {
                    threads,
                    md_steps,
                    trajectory_length,
                    mode,
                }),
                values: parse_values(&fields[7..])?,
                source_line,
            })
        }
    }
}

fn parse_values(fields: &[&str]) -> Result<ExtractedValues, String> {
    Ok(ExtractedValues {
        plaquette: parse_field::<f64>(fields[0], "plaquette")?,
        checksum_rng: fields[1].to_string(),
        checksum_lat: fields[2].to_string(),
    })
}

fn parse_field<T: std::str::FromStr>(token: &str, name: &str) -> Result<T, String> {
    token
        .parse::<T>()
        .map_err(|_| format!("invalid {} value '{}'", name, token))
}
