use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

/// Set once the user asks the process to stop. Cloned handles share one flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes Ctrl+C into a fresh flag. A failure to install the handler is logged
    /// and the flag simply never fires.
    pub fn install() -> Self {
        let interrupt = Self::new();
        let handler = interrupt.clone();
        if let Err(err) = ctrlc::set_handler(move || handler.trigger()) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
        interrupt
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let interrupt = Interrupt::new();
        let other = interrupt.clone();
        assert!(!other.is_triggered());
        interrupt.trigger();
        assert!(other.is_triggered());
    }
}
