pub const NERSC_WRITE_MARKER: &str = "Written NERSC";
pub const CHECKSUM_MARKER: &str = "checksum ";
pub const MD_STEPS_MARKER: &str = "Number of MD steps";
pub const TRAJECTORY_LENGTH_MARKER: &str = "Trajectory length";
pub const ACCELERATOR_MARKER: &str = "cuda";

/// Meaning of one captured log line that carries a known marker.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    /// RNG checkpoint write: a single token follows `checksum `.
    RngChecksum(String),
    /// Lattice checkpoint write: `checksum <lat> <label> <plaquette>`.
    LatticeChecksum { checksum: String, plaquette: f64 },
    MdSteps(u32),
    TrajectoryLength(f64),
    /// A marker was present but the rest of the line did not fit its shape.
    Unrecognized(String),
}

/// Classifies one log line. Lines without any marker yield `None`.
pub fn classify_line(line: &str) -> Option<OutputLine> {
    if line.contains(NERSC_WRITE_MARKER) {
        return Some(classify_checksum_line(line));
    }

    if let Some(value) = value_after_marker(line, MD_STEPS_MARKER) {
        return Some(match value.parse::<u32>() {
            Ok(steps) => OutputLine::MdSteps(steps),
            Err(_) => unrecognized(line),
        });
    }

    if let Some(value) = value_after_marker(line, TRAJECTORY_LENGTH_MARKER) {
        return Some(match value.parse::<f64>() {
            Ok(length) => OutputLine::TrajectoryLength(length),
            Err(_) => unrecognized(line),
        });
    }

    (line.contains(MD_STEPS_MARKER) || line.contains(TRAJECTORY_LENGTH_MARKER))
        .then(|| unrecognized(line))
}

/// Accelerator evidence can appear on any line, including ones that also
/// carry a checksum or integrator marker.
pub fn reports_accelerator(line: &str) -> bool {
    line.contains(ACCELERATOR_MARKER)
}

fn classify_checksum_line(line: &str) -> OutputLine {
    let Some((_, tail)) = line.split_once(CHECKSUM_MARKER) else {
        return unrecognized(line);
    };

    let tokens = tail.split_whitespace().collect::<Vec<_>>();
    match tokens.as_slice() {
        [checksum] => OutputLine::RngChecksum((*checksum).to_string()),
        [checksum, _, plaquette] => match plaquette.parse::<f64>() {
            Ok(plaquette) => OutputLine::LatticeChecksum {
                checksum: (*checksum).to_string(),
                plaquette,
            },
            Err(_) => unrecognized(line),
        },
        _ => unrecognized(line),
    }
}

// Value is the first token of the colon-delimited field after the marker,
// e.g. `... [Integrator] Number of MD steps : 10`.
fn value_after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let (_, tail) = line.split_once(marker)?;
    let (_, field) = tail.split_once(':')?;
    field.split_whitespace().next()
}

fn unrecognized(line: &str) -> OutputLine {
    OutputLine::Unrecognized(line.trim_end().to_string())
}
