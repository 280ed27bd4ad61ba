mod backend;
mod backends;
mod result;

pub use backend::{DetectorBackend, Inference};
pub use backends::StubBackend;
pub use result::{Detection, Summary};
