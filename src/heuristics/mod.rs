pub mod sanitize;
pub mod template_select;

pub use sanitize::*;
pub use template_select::*;
