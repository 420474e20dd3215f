//! Public request/response types for the inference gateway.

pub mod code;
pub mod execution;
pub mod request;
pub mod response;

pub use code::CodeBlock;
pub use execution::ExecutionResult;
pub use request::{ExecutionConfig, InferenceRequest};
pub use response::{InferenceResponse, ModelResponse, SynthesisStrategy, VerificationReport};
