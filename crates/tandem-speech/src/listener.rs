//! Listening gate shared between the UI surface and transcript ingest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Thread-safe start/stop control plus the selected recognition language.
///
/// The UI flips the gate; ingest consults it before accepting segments.
#[derive(Debug)]
pub struct ListenerControl {
    active: AtomicBool,
    /// (display name, recognition code) of the selected language.
    language: RwLock<(String, String)>,
}

impl ListenerControl {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            active: AtomicBool::new(false),
            language: RwLock::new((language.into(), code.into())),
        }
    }

    pub fn start(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub fn is_listening(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_language(&self, language: impl Into<String>, code: impl Into<String>) {
        if let Ok(mut guard) = self.language.write() {
            *guard = (language.into(), code.into());
        }
    }

    /// Display name of the selected language.
    pub fn language(&self) -> String {
        self.language
            .read()
            .map(|guard| guard.0.clone())
            .unwrap_or_default()
    }

    /// Recognition code of the selected language.
    pub fn language_code(&self) -> String {
        self.language
            .read()
            .map(|guard| guard.1.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let control = ListenerControl::new("English", "en");
        assert!(!control.is_listening());
    }

    #[test]
    fn test_start_stop() {
        let control = ListenerControl::new("English", "en");
        control.start();
        assert!(control.is_listening());
        control.stop();
        assert!(!control.is_listening());
    }

    #[test]
    fn test_language_switch() {
        let control = ListenerControl::new("English", "en");
        assert_eq!(control.language(), "English");
        assert_eq!(control.language_code(), "en");

        control.set_language("Spanish", "es");
        assert_eq!(control.language(), "Spanish");
        assert_eq!(control.language_code(), "es");
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;
        let control = Arc::new(ListenerControl::new("English", "en"));
        let clone = Arc::clone(&control);
        let handle = std::thread::spawn(move || clone.start());
        handle.join().unwrap();
        assert!(control.is_listening());
    }
}
