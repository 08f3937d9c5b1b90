use std::{error::Error, fmt::Display};

#[derive(Debug, PartialEq)]
pub enum BffKvMapError {
    // Argument errors, not retriable with the same arguments
    MismatchedNumberOfKeysAndValues,
    DuplicateKeysInMap,
    PlaintextModuloTooSmall,
    PlaintextModuloTooLarge,

    // Stochastic error, caller may retry with a new seed
    ExhaustedAllAttemptsToBuildFilter(usize),
    KeyNotFoundInMap,

    // Codec
    SerializationBufferSizeMismatch,
    DeserializationByteCountMismatch,
    DeserializationHeaderInconsistent,
}

impl Display for BffKvMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MismatchedNumberOfKeysAndValues => write!(f, "Number of keys and values must be equal."),
            Self::DuplicateKeysInMap => write!(f, "All keys must be distinct."),
            Self::PlaintextModuloTooSmall => write!(f, "Plaintext modulo must be >= 256."),
            Self::PlaintextModuloTooLarge => write!(f, "Plaintext modulo must be <= 2^32."),

            Self::ExhaustedAllAttemptsToBuildFilter(max_num_attempts) => {
                write!(f, "Exhausted '{}' attempts to build binary fuse filter for input key-value map", max_num_attempts)
            }
            Self::KeyNotFoundInMap => write!(f, "Hash of key is not present in hashmap"),

            Self::SerializationBufferSizeMismatch => write!(f, "Serialization buffer size doesn't match the exact serialized filter size."),
            Self::DeserializationByteCountMismatch => write!(f, "Serialized filter byte count doesn't match the length implied by its header."),
            Self::DeserializationHeaderInconsistent => write!(f, "Serialized filter header holds inconsistent field values."),
        }
    }
}

impl Error for BffKvMapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
