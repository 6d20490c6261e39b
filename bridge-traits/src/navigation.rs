//! Host Navigation Abstraction

/// Hard navigation of the host view.
///
/// A hard redirect discards in-memory state the same way a full page load
/// would. The API layer uses it after the backend rejects the session so the
/// user lands on the login route with nothing stale left behind.
///
/// Implementations must not block; hosts typically forward the path to their
/// UI thread.
pub trait Navigator: Send + Sync {
    /// Replace the current location with `path`.
    fn hard_redirect(&self, path: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNavigator {
        visited: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn hard_redirect(&self, path: &str) {
            if let Ok(mut visited) = self.visited.lock() {
                visited.push(path.to_string());
            }
        }
    }

    #[test]
    fn navigator_is_object_safe() {
        let navigator = RecordingNavigator::default();
        let dyn_nav: &dyn Navigator = &navigator;
        dyn_nav.hard_redirect("/login");

        assert_eq!(*navigator.visited.lock().unwrap(), vec!["/login"]);
    }
}
