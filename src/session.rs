/// Per-session interaction state: the fault type the user last clicked.
///
/// Owned by whoever drives the session and passed into report assembly; it
/// is never shared between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    highlighted_category: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// Returns `true` when the highlight actually changed.
    pub fn highlight(&mut self, category: &str) -> bool {
        let category = category.trim();
        if category.is_empty() {
            return self.clear();
        }
        if self.highlighted_category.as_deref() == Some(category) {
            return false;
        }
        self.highlighted_category = Some(category.to_string());
        true
    }

    pub fn clear(&mut self) -> bool {
        self.highlighted_category.take().is_some()
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted_category.as_deref()
    }
}
