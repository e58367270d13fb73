pub mod synth;
pub mod versions;

pub use synth::{PromptSynthesizer, StylePrompts};
pub use versions::PromptVersion;
