//! The recognized component folders.
//!
//! Every module mount must target one of these eight subtrees. They are the
//! only permitted top-level names in the composed site filesystem.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The eight component folders, in the order they are listed to users.
pub const COMPONENT_FOLDERS: [Component; 8] = [
    Component::Archetypes,
    Component::Assets,
    Component::Content,
    Component::Data,
    Component::I18n,
    Component::Layouts,
    Component::Resources,
    Component::Static,
];

/// A recognized component subtree of the site source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Archetypes,
    Assets,
    Content,
    Data,
    I18n,
    Layouts,
    Resources,
    Static,
}

impl Component {
    /// The folder name for this component.
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Archetypes => "archetypes",
            Component::Assets => "assets",
            Component::Content => "content",
            Component::Data => "data",
            Component::I18n => "i18n",
            Component::Layouts => "layouts",
            Component::Resources => "resources",
            Component::Static => "static",
        }
    }

    /// Classify a mount target by its first path segment.
    ///
    /// Returns `None` if the target does not start with a recognized
    /// component folder.
    pub fn from_target(target: &Path) -> Option<Component> {
        let first = target.iter().next()?;
        first.to_str().and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archetypes" => Ok(Component::Archetypes),
            "assets" => Ok(Component::Assets),
            "content" => Ok(Component::Content),
            "data" => Ok(Component::Data),
            "i18n" => Ok(Component::I18n),
            "layouts" => Ok(Component::Layouts),
            "resources" => Ok(Component::Resources),
            "static" => Ok(Component::Static),
            _ => Err(()),
        }
    }
}
