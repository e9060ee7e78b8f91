#[allow(unused_imports)]
pub use crate::error::{PsTreeError, PsTreeResult};
#[allow(unused_imports)]
pub use log::{debug, error, info, trace, warn};
