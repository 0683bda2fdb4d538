pub mod checksum;
pub mod deep;
pub mod findings;
pub mod layout;
pub mod validator;

pub use deep::DeepCheck;
pub use findings::{Finding, Severity, ValidationReport};
pub use layout::{FormatVersion, HeaderRecord, RootRecord};
pub use validator::{Validator, MIN_FILE_SIZE};

#[cfg(test)]
pub(crate) mod test_fixture;
