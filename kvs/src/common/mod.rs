mod constants;
mod key;
mod util;

pub use constants::*;
pub use key::*;
pub use util::*;
