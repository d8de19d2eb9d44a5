use crate::error::{BoxError, MutexError};
use crate::manager::MutexManager;
use crate::mutex::MutexExt;
use crate::name::MutexName;

/// Run `body` under the default-kind mutex whose instance id is `name`.
///
/// `name` is used verbatim: a `"kind::"` prefix is not parsed.
pub fn sync<R, E, F>(manager: &MutexManager, name: &str, body: F) -> Result<R, MutexError>
where
    F: FnOnce() -> Result<R, E>,
    E: Into<BoxError>,
{
    let name = MutexName::new(MutexName::DEFAULT_KIND, name)
        .map_err(|e| MutexError::with_cause(format!("Invalid mutex name '{}'", name), e))?;
    manager.mutex(&name)?.acquire(|_| body())
}
