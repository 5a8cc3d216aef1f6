//! Data models shared by the document store, the attachment backends and the
//! repository workflows.

mod batch;
mod media;
mod status;

pub use batch::*;
pub use media::*;
pub use status::*;
