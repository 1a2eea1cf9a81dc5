pub mod artifact;
pub mod intent;
pub mod prediction;

pub use self::artifact::*;
pub use self::intent::*;
pub use self::prediction::*;
