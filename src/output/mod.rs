pub mod entry;
pub mod transformer;

pub use entry::{OutputEntry, OutputMap, OutputValue, Scalar, parse_outputs};
pub use transformer::{EnvAssignment, OutputTransformer, REDACTION_TOKEN, TransformReport};
