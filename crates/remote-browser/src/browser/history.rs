//! Back/forward navigation history and server path math.

/// Makes a server path absolute and drops trailing slashes (`"docs/"` is `/docs`).
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::from("/")
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Parent of a normalized path, clamped at `/`.
pub fn parent_path(path: &str) -> String {
    match normalize_path(path).rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent.to_string(),
        _ => String::from("/"),
    }
}

/// Back and forward stacks of visited folders.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NavigationHistory {
    back: Vec<String>,
    forward: Vec<String>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records leaving `from` for `to`. Going to the same folder records nothing.
    /// Returns true if history changed.
    pub fn visit(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        self.back.push(from.to_string());
        self.forward.clear();
        true
    }

    /// Pops the previous folder, remembering `current` for forward navigation.
    pub fn go_back(&mut self, current: &str) -> Option<String> {
        let previous = self.back.pop()?;
        self.forward.push(current.to_string());
        Some(previous)
    }

    pub fn go_forward(&mut self, current: &str) -> Option<String> {
        let next = self.forward.pop()?;
        self.back.push(current.to_string());
        Some(next)
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }
}
