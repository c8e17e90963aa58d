pub mod study;
pub mod template;

pub use study::*;
pub use template::*;
