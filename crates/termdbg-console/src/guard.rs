use std::sync::Arc;

use tracing::warn;

use crate::console::ConsoleIo;
use crate::error::ConsoleError;

/// Holds a console in full-screen mode and releases it on drop.
///
/// Release is idempotent on the console side, so dropping the guard after
/// the console has already been closed is harmless.
pub struct FullScreenGuard {
    console: Arc<dyn ConsoleIo>,
}

impl FullScreenGuard {
    pub fn enter(console: Arc<dyn ConsoleIo>) -> Result<Self, ConsoleError> {
        console.enter_full_screen()?;
        Ok(Self { console })
    }
}

impl Drop for FullScreenGuard {
    fn drop(&mut self) {
        if let Err(err) = self.console.exit_full_screen() {
            warn!(error = %err, "failed to leave full-screen mode");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedConsole;

    #[test]
    fn released_once_on_drop() {
        let console = Arc::new(ScriptedConsole::new());
        {
            let _guard = FullScreenGuard::enter(console.clone()).unwrap();
            assert!(console.is_full_screen());
        }
        assert!(!console.is_full_screen());
        assert_eq!(console.enter_count(), 1);
        assert_eq!(console.release_count(), 1);
    }

    #[test]
    fn drop_after_close_does_not_release_twice() {
        let console = Arc::new(ScriptedConsole::new());
        let guard = FullScreenGuard::enter(console.clone()).unwrap();
        console.close();
        drop(guard);
        assert_eq!(console.release_count(), 1);
    }
}
