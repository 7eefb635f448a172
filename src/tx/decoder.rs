//! Dispatch error decoding.

use thiserror::Error;

use crate::chain::registry::{ErrorMetadata, ErrorRegistry};
use crate::tx::types::{DispatchErrorRef, TxOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Unknown module error (module {module}, error {error})")]
    UnknownModuleError { module: u8, error: u8 },
}

/// A dispatch error in human-readable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedError {
    Module(ErrorMetadata),
    Generic(String),
}

impl DecodedError {
    /// `section.name` for module errors, the reason otherwise.
    pub fn message(&self) -> String {
        match self {
            DecodedError::Module(meta) => format!("{}.{}", meta.section, meta.name),
            DecodedError::Generic(reason) => reason.clone(),
        }
    }

    /// Documentation lines joined into one sentence.
    pub fn details(&self) -> Option<String> {
        match self {
            DecodedError::Module(meta) => Some(
                meta.documentation
                    .iter()
                    .map(|line| line.trim())
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            DecodedError::Generic(_) => None,
        }
    }
}

pub fn decode(reference: &DispatchErrorRef, registry: &ErrorRegistry) -> Result<DecodedError, DecodeError> {
    match reference {
        DispatchErrorRef::Module { index, error } => registry
            .find(*index, *error)
            .cloned()
            .map(DecodedError::Module)
            .ok_or(DecodeError::UnknownModuleError {
                module: *index,
                error: *error,
            }),
        DispatchErrorRef::Other(reason) => Ok(DecodedError::Generic(reason.clone())),
    }
}

/// Failed outcome for a dispatch error. Undecodable module errors fall back to
/// the error kind without details.
pub fn failure_outcome(reference: &DispatchErrorRef, registry: &ErrorRegistry) -> TxOutcome {
    match decode(reference, registry) {
        Ok(decoded) => TxOutcome::failed(Some(decoded.message()), decoded.details()),
        Err(e) => {
            tracing::warn!(error = %e, "Dispatch error not in registry");
            TxOutcome::failed(Some(reference.kind().to_string()), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ErrorRegistry {
        let mut registry = ErrorRegistry::empty();
        registry.insert(
            3,
            1,
            ErrorMetadata {
                section: "market".into(),
                name: "FileTooLarge".into(),
                documentation: vec![" File size".into(), "".into(), "is too large.".into()],
            },
        );
        registry
    }

    #[test]
    fn test_module_error() {
        let decoded = decode(&DispatchErrorRef::Module { index: 3, error: 1 }, &registry()).unwrap();
        assert_eq!(decoded.message(), "market.FileTooLarge");
        assert_eq!(decoded.details().as_deref(), Some("File size is too large."));
    }

    #[test]
    fn test_unknown_module_error() {
        let reference = DispatchErrorRef::Module { index: 9, error: 9 };
        assert_eq!(
            decode(&reference, &registry()),
            Err(DecodeError::UnknownModuleError { module: 9, error: 9 })
        );

        let outcome = failure_outcome(&reference, &registry());
        assert_eq!(outcome, TxOutcome::failed(Some("Module".into()), None));
    }

    #[test]
    fn test_generic_error() {
        let reference = DispatchErrorRef::Other("BadOrigin".into());
        let decoded = decode(&reference, &ErrorRegistry::empty()).unwrap();
        assert_eq!(decoded, DecodedError::Generic("BadOrigin".into()));
        assert_eq!(decoded.details(), None);
    }
}
