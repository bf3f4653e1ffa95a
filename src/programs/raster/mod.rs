mod translate;
mod warp;

pub use translate::{translate, TranslateOptions};
pub use warp::{warp, WarpAppOptions};
