/// Errors from the render layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidPipelineConfiguration(String),
    #[error(
        "frame is {}x{} but the pipeline expects {}x{}",
        actual.0, actual.1, expected.0, expected.1
    )]
    ResolutionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}
