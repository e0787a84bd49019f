pub mod registry;
pub mod traits;

pub use registry::{RegistryError, Stdio};
pub use traits::{StdioDriver, StdioError};
