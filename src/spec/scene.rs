
//! The parts of a scene that record which files were loaded.
//! Scene files themselves are copied as opaque files.

/// A named value stored in a scene class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneInfo {
    pub name: String,
    pub value: String,
}

/// A group of values saved by one component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SceneClass {
    pub name: String,
    pub infos: Vec<SceneInfo>,
}

impl SceneClass {
    pub fn new(name: impl Into<String>) -> Self {
        SceneClass { name: name.into(), infos: Vec::new() }
    }

    pub fn add_info(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.infos.push(SceneInfo { name: name.into(), value: value.into() });
    }

    pub fn is_empty(&self) -> bool { self.infos.is_empty() }
}

/// A snapshot of the display, of which only the classes are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scene {
    pub name: String,
    pub classes: Vec<SceneClass>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Scene { name: name.into(), classes: Vec::new() }
    }

    pub fn add_class(&mut self, class: SceneClass) {
        self.classes.push(class);
    }

    pub fn class(&self, name: &str) -> Option<&SceneClass> {
        self.classes.iter().find(|class| class.name == name)
    }
}
