mod text;

pub use text::{slugify, strip_supplementary};
