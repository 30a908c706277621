pub mod budget;
pub mod chunk;
pub mod deepgram;
pub mod segment;
pub mod summary;
pub mod template;

pub use budget::*;
pub use chunk::*;
pub use deepgram::*;
pub use segment::*;
pub use summary::*;
pub use template::*;
