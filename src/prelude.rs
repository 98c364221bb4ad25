//! Common imports for hosts and sink implementations.

pub use crate::config::{ProbeConfig, ProbeMode};
pub use crate::jni_wrapper::{JavaVm, JniEnv};
pub use crate::marshal::{ArgPosition, ForeignStrings, MarshalError, Marshaler, TextView};
pub use crate::natives::install_probe;
pub use crate::probe::{DisabledProbe, ProbeArgs, ProbeSink, TracingProbe};
pub use crate::sys::jni;
