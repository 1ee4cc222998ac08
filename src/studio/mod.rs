//! Studio module - turns prompts and reference material into generated images.

pub mod credentials;
pub mod docx;
pub mod enhance;
pub mod error;
pub mod export;
pub mod gemini;
pub mod generator;
pub mod history;
pub mod input;
pub mod location;
pub mod pipeline;
pub mod places;
pub mod types;

pub use credentials::{CredentialGate, KeyProvider, LineSource, PromptKeySelector};
pub use error::{ErrorKind, StudioError};
pub use gemini::{GeminiClient, ModelApi};
pub use history::History;
pub use input::Attachment;
pub use pipeline::{Models, RunState, Studio};
pub use types::{AspectRatio, DesignStyle, GeneratedImage, GenerationConfig, ImagePart};
