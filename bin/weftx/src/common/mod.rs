mod args;
mod error;
mod io;
mod logging;

pub use args::*;
pub use error::*;
pub use io::*;
pub use logging::*;
