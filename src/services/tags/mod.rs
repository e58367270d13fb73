pub mod content;
pub mod library;
pub mod recommend;

pub use library::{Tag, TagNamespace};
pub use recommend::{default_tag_recommendation, TagRecommendation, TagRecommender, TagStrategy};
