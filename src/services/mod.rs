pub mod envelope;
pub mod image_gen;
pub mod images;
pub mod llm;
pub mod parser;
pub mod phrases;
pub mod prompts;
pub mod selection;
pub mod tags;
pub mod video;
pub mod video_gen;
pub mod voice;
pub mod wizard;

#[cfg(test)]
pub(crate) mod mock;
