use std::fmt;

/// Opaque path of an element in the remote scripting tree, for example
/// `wnd[0]/usr/ctxtBUKRS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Index of the window the path is rooted in (`wnd[1]/...` -> 1).
    pub fn window_index(&self) -> Option<u32> {
        let rest = self.0.strip_prefix("wnd[")?;
        let end = rest.find(']')?;
        rest[..end].parse().ok()
    }

    /// Last path segment, which carries the scripting type prefix.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ElementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Coarse window classification shared by desktop and session windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowRole {
    /// Application main window
    Main,
    /// Modal popup of a remote session
    Modal,
    /// Desktop dialog (file pickers, message boxes)
    Dialog,
    Other,
}

/// Predicate a window wait is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowPredicate {
    /// Exact title, ignoring surrounding whitespace
    Title(String),
    TitleContains(String),
    Role(WindowRole),
    Any,
    And(Vec<WindowPredicate>),
    Or(Vec<WindowPredicate>),
}

impl WindowPredicate {
    pub fn title(title: impl Into<String>) -> Self {
        WindowPredicate::Title(title.into())
    }

    pub fn title_contains(fragment: impl Into<String>) -> Self {
        WindowPredicate::TitleContains(fragment.into())
    }

    pub fn and(self, other: WindowPredicate) -> Self {
        match self {
            WindowPredicate::And(mut all) => {
                all.push(other);
                WindowPredicate::And(all)
            }
            first => WindowPredicate::And(vec![first, other]),
        }
    }

    pub fn matches(&self, title: &str, role: WindowRole) -> bool {
        match self {
            WindowPredicate::Title(expected) => title.trim() == expected.trim(),
            WindowPredicate::TitleContains(fragment) => title.contains(fragment.as_str()),
            WindowPredicate::Role(expected) => role == *expected,
            WindowPredicate::Any => true,
            WindowPredicate::And(all) => all.iter().all(|p| p.matches(title, role)),
            WindowPredicate::Or(any) => any.iter().any(|p| p.matches(title, role)),
        }
    }
}

impl fmt::Display for WindowPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowPredicate::Title(t) => write!(f, "title '{t}'"),
            WindowPredicate::TitleContains(t) => write!(f, "title containing '{t}'"),
            WindowPredicate::Role(r) => write!(f, "{r:?} window"),
            WindowPredicate::Any => f.write_str("any window"),
            WindowPredicate::And(all) => join(f, all, " and "),
            WindowPredicate::Or(any) => join(f, any, " or "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, parts: &[WindowPredicate], sep: &str) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{part}")?;
    }
    Ok(())
}
