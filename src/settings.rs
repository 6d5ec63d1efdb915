//! Validation of the Settings a Participant joins an MPC-Session with
//!
//! Before any message is exchanged every Participant checks that the
//! declared Participants fit the Circuit and that its own Inputs match what
//! it claimed to provide.
//!
//! # Example
//! ```rust
//! # use mpc_messaging::settings::{validate_settings, CircuitInfo, Participant};
//! let circuit = CircuitInfo::new(["a", "b"], ["c"]);
//! let participants = [
//!     Participant::new("alice", ["a"], ["c"]),
//!     Participant::new("bob", ["b"], ["c"]),
//! ];
//!
//! assert!(validate_settings(&circuit, &participants, "alice", ["a"]).is_ok());
//! assert!(validate_settings(&circuit, &participants, "alice", ["a", "x"]).is_err());
//! ```

use std::collections::BTreeSet;

use thiserror::Error;

/// The Interface a Circuit declares
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CircuitInfo {
    /// The Names of all the Inputs of the Circuit
    pub input_names: Vec<String>,
    /// The Names of all the Outputs of the Circuit
    pub output_names: Vec<String>,
}

impl CircuitInfo {
    /// Creates a new CircuitInfo from the given Names
    pub fn new<I, O>(input_names: I, output_names: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            input_names: input_names.into_iter().map(Into::into).collect(),
            output_names: output_names.into_iter().map(Into::into).collect(),
        }
    }
}

/// A single named Party of a Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// The unique Name of the Participant
    pub name: String,
    /// The Circuit-Inputs this Participant provides
    pub inputs: Vec<String>,
    /// The Circuit-Outputs this Participant receives
    pub outputs: Vec<String>,
}

impl Participant {
    /// Creates a new Participant
    pub fn new<I, O>(name: impl Into<String>, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }
}

/// The Reasons why Settings are rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The same Input has been claimed more than once
    #[error("input `{input}` is claimed more than once")]
    DuplicateInput {
        /// The Input in question
        input: String,
    },
    /// The Inputs of all the Participants together differ from the Inputs
    /// of the Circuit
    #[error("participant inputs do not match the circuit inputs (missing: {missing:?}, unexpected: {unexpected:?})")]
    InputsMismatch {
        /// Circuit-Inputs no Participant provides
        missing: Vec<String>,
        /// Inputs that are not part of the Circuit
        unexpected: Vec<String>,
    },
    /// A Participant receives an Output the Circuit does not have
    #[error("participant `{participant}` has unknown output `{output}`")]
    UnknownOutput {
        /// The Participant in question
        participant: String,
        /// The unknown Output
        output: String,
    },
    /// The calling Participant is not part of the Session
    #[error("participant `{name}` not found")]
    UnknownParticipant {
        /// The Name that was looked up
        name: String,
    },
    /// The supplied Inputs differ from the Inputs the Participant declared
    #[error("inputs supplied by `{participant}` do not match its declared inputs (missing: {missing:?}, unexpected: {unexpected:?})")]
    SuppliedInputsMismatch {
        /// The calling Participant
        participant: String,
        /// Declared Inputs that were not supplied
        missing: Vec<String>,
        /// Supplied Inputs that were not declared
        unexpected: Vec<String>,
    },
}

/// Returns the (missing, unexpected) Names of `actual` compared to `expected`
fn difference(expected: &BTreeSet<&str>, actual: &BTreeSet<&str>) -> (Vec<String>, Vec<String>) {
    let missing = expected.difference(actual).map(|s| s.to_string()).collect();
    let unexpected = actual.difference(expected).map(|s| s.to_string()).collect();
    (missing, unexpected)
}

/// Checks the Participants against the Circuit and the supplied Inputs of
/// the Participant `name` against its declared Inputs
///
/// # Rules
/// * No Input may be claimed more than once
/// * The Inputs of all Participants together must be exactly the Inputs of
/// the Circuit
/// * Every Output of a Participant must be an Output of the Circuit
/// * `name` must be one of the Participants
/// * The supplied Input-Names must be exactly the Inputs declared by `name`
///
/// All Comparisons are done on Sets, the order of the Names does not matter.
pub fn validate_settings<I>(
    circuit: &CircuitInfo,
    participants: &[Participant],
    name: &str,
    input_names: I,
) -> Result<(), ValidationError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut claimed = BTreeSet::new();
    for input in participants.iter().flat_map(|p| p.inputs.iter()) {
        if !claimed.insert(input.as_str()) {
            return Err(ValidationError::DuplicateInput {
                input: input.clone(),
            });
        }
    }

    let circuit_inputs: BTreeSet<&str> = circuit.input_names.iter().map(String::as_str).collect();
    if claimed != circuit_inputs {
        let (missing, unexpected) = difference(&circuit_inputs, &claimed);
        return Err(ValidationError::InputsMismatch {
            missing,
            unexpected,
        });
    }

    let circuit_outputs: BTreeSet<&str> =
        circuit.output_names.iter().map(String::as_str).collect();
    for participant in participants {
        if let Some(output) = participant
            .outputs
            .iter()
            .find(|output| !circuit_outputs.contains(output.as_str()))
        {
            return Err(ValidationError::UnknownOutput {
                participant: participant.name.clone(),
                output: output.clone(),
            });
        }
    }

    let participant = participants
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ValidationError::UnknownParticipant {
            name: name.to_owned(),
        })?;

    let supplied: Vec<I::Item> = input_names.into_iter().collect();
    let supplied: BTreeSet<&str> = supplied.iter().map(|item| item.as_ref()).collect();
    let declared: BTreeSet<&str> = participant.inputs.iter().map(String::as_str).collect();
    if supplied != declared {
        let (missing, unexpected) = difference(&declared, &supplied);
        return Err(ValidationError::SuppliedInputsMismatch {
            participant: participant.name.clone(),
            missing,
            unexpected,
        });
    }

    Ok(())
}
