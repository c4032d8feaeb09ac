//! # Scene Registry
//!
//! The static description of every scene the app can navigate to.
//!
//! Scenes are declared as a nested tree (`SceneSpec`) and flattened once into
//! a `SceneRegistry`: a map from registry key to `Scene` descriptor with parent
//! pointers filled in and `base` aliases merged. The registry is read-only
//! during reduction.
//!
//! ```text
//! SceneSpec (nested)                 SceneRegistry (flat)
//! root [tabs]                        root    -> { tabs, children: [home, profile] }
//! ├── home                           home    -> { parent: root, children: [feed, detail] }
//! │   ├── feed                       feed    -> { parent: home }
//! │   └── detail [clone]             detail  -> { parent: home, clone }
//! └── profile                        profile -> { parent: root, children: [me] }
//!     └── me                         me      -> { parent: profile }
//! ```

use log::{debug, info};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::core::error::NavError;

/// Arbitrary user-defined scene properties (titles, components, styling).
pub type Props = Map<String, Value>;

/// One entry of the declarative scene description.
///
/// Any field not listed here lands in `props` and is copied verbatim into the
/// route nodes spawned from this scene.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneSpec {
    pub key: String,
    #[serde(default)]
    pub scene_key: Option<String>,
    #[serde(default)]
    pub tabs: Option<bool>,
    #[serde(default)]
    pub initial: bool,
    #[serde(default)]
    pub clone: Option<bool>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub children: Vec<SceneSpec>,
    #[serde(flatten)]
    pub props: Props,
}

impl SceneSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn tabs(mut self) -> Self {
        self.tabs = Some(true);
        self
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn cloned(mut self) -> Self {
        self.clone = Some(true);
        self
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: SceneSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// A scene description file: registry-level default props plus the root scene.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub root_props: Props,
    pub scene: SceneSpec,
}

/// A flattened, alias-resolved scene descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub key: String,
    /// Key of the scene as it appears in the route tree.
    pub scene_key: String,
    /// Registry key of the enclosing scene. `None` only for the root.
    pub parent: Option<String>,
    pub tabs: bool,
    pub children: Vec<String>,
    pub initial: bool,
    pub base: Option<String>,
    pub clone: bool,
    pub props: Props,
}

impl Scene {
    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    /// A push/pop stack: has children and is not a tab group.
    pub fn is_stack(&self) -> bool {
        self.is_container() && !self.tabs
    }
}

/// Scene fields before alias resolution; flags stay optional so an alias
/// can tell "unset" apart from "explicitly false".
#[derive(Debug, Clone)]
struct RawScene {
    key: String,
    scene_key: String,
    parent: Option<String>,
    tabs: Option<bool>,
    children: Vec<String>,
    initial: bool,
    base: Option<String>,
    clone: Option<bool>,
    props: Props,
}

#[derive(Debug, Clone, Default)]
pub struct SceneRegistry {
    scenes: HashMap<String, Scene>,
    root: Option<String>,
    root_props: Props,
}

impl SceneRegistry {
    /// Flattens a nested scene description into a registry.
    pub fn build(spec: SceneSpec, root_props: Props) -> Result<Self, NavError> {
        let root = spec.key.clone();
        let mut raw = HashMap::new();
        flatten(spec, None, &mut raw)?;

        let mut scenes = HashMap::with_capacity(raw.len());
        for (key, entry) in &raw {
            let scene = resolve_alias(entry, &raw)?;
            scenes.insert(key.clone(), scene);
        }

        info!("Scene registry built: {} scenes, root={}", scenes.len(), root);
        Ok(Self {
            scenes,
            root: Some(root),
            root_props,
        })
    }

    pub fn from_file(file: SceneFile) -> Result<Self, NavError> {
        Self::build(file.scene, file.root_props)
    }

    pub fn resolve(&self, key: &str) -> Result<&Scene, NavError> {
        self.scenes
            .get(key)
            .ok_or_else(|| NavError::NotFound(format!("No scene exists for key={key}")))
    }

    pub fn get(&self, key: &str) -> Option<&Scene> {
        self.scenes.get(key)
    }

    pub fn root(&self) -> Result<&Scene, NavError> {
        let key = self
            .root
            .as_deref()
            .ok_or_else(|| NavError::Configuration("Scene registry has no root".to_string()))?;
        self.scenes
            .get(key)
            .ok_or_else(|| NavError::Configuration(format!("Root scene {key} is not registered")))
    }

    /// Registry-level default properties.
    pub fn root_props(&self) -> &Props {
        &self.root_props
    }

    /// Maps a registry key to the scene key used in the route tree.
    /// Unknown keys are assumed to already be scene keys.
    pub fn scene_key_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.scenes
            .get(key)
            .map(|scene| scene.scene_key.as_str())
            .unwrap_or(key)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// True if `scene_key` names `ancestor` itself or an alias built on it
    /// (directly or through a chain of `base` links).
    pub fn is_instance_of(&self, scene_key: &str, ancestor: &str) -> bool {
        let mut key = scene_key;
        let mut hops = 0;
        loop {
            if key == ancestor || self.scene_key_for(key) == ancestor {
                return true;
            }
            match self.scenes.get(key).and_then(|scene| scene.base.as_deref()) {
                Some(base) if hops < self.scenes.len() => {
                    key = base;
                    hops += 1;
                }
                _ => return false,
            }
        }
    }
}

fn flatten(
    spec: SceneSpec,
    parent: Option<&str>,
    out: &mut HashMap<String, RawScene>,
) -> Result<(), NavError> {
    if spec.key.is_empty() {
        return Err(NavError::Configuration(format!(
            "Scene under parent={} has an empty key",
            parent.unwrap_or("<root>")
        )));
    }
    if out.contains_key(&spec.key) {
        return Err(NavError::Configuration(format!(
            "Duplicate scene key={}",
            spec.key
        )));
    }

    let SceneSpec {
        key,
        scene_key,
        tabs,
        initial,
        clone,
        base,
        children,
        props,
    } = spec;

    let child_keys = children.iter().map(|c| c.key.clone()).collect();
    out.insert(
        key.clone(),
        RawScene {
            scene_key: scene_key.unwrap_or_else(|| key.clone()),
            key: key.clone(),
            parent: parent.map(str::to_string),
            tabs,
            children: child_keys,
            initial,
            base,
            clone,
            props,
        },
    );

    for child in children {
        flatten(child, Some(&key), out)?;
    }
    Ok(())
}

/// Merges an alias with its base chain. Fields set on the alias win; props
/// are layered from the deepest base up to the alias.
fn resolve_alias(entry: &RawScene, raw: &HashMap<String, RawScene>) -> Result<Scene, NavError> {
    let mut chain = vec![entry];
    let mut seen = HashSet::from([entry.key.as_str()]);
    let mut current = entry;
    while let Some(base) = current.base.as_deref() {
        let next = raw.get(base).ok_or_else(|| {
            NavError::Configuration(format!(
                "No scene exists for base={base} (alias {})",
                entry.key
            ))
        })?;
        if !seen.insert(next.key.as_str()) {
            return Err(NavError::Configuration(format!(
                "Alias cycle through base={base} (alias {})",
                entry.key
            )));
        }
        chain.push(next);
        current = next;
    }

    if chain.len() > 1 {
        debug!("Resolving alias {} through {} base(s)", entry.key, chain.len() - 1);
    }

    let mut props = Props::new();
    for scene in chain.iter().rev() {
        props.extend(scene.props.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    let tabs = chain.iter().find_map(|s| s.tabs).unwrap_or(false);
    let clone = chain.iter().find_map(|s| s.clone).unwrap_or(false);
    // an alias without its own children reuses the nearest base's
    let children = chain
        .iter()
        .map(|s| &s.children)
        .find(|children| !children.is_empty())
        .cloned()
        .unwrap_or_default();

    Ok(Scene {
        key: entry.key.clone(),
        scene_key: entry.scene_key.clone(),
        parent: entry.parent.clone(),
        tabs,
        children,
        initial: entry.initial,
        base: entry.base.clone(),
        clone,
        props,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tab_app_spec;
    use serde_json::json;

    #[test]
    fn test_build_flattens_and_links_parents() {
        let registry = SceneRegistry::build(tab_app_spec(), Props::new()).unwrap();
        let root = registry.root().unwrap();
        assert_eq!(root.key, "root");
        assert!(root.tabs);
        assert!(root.parent.is_none());
        assert_eq!(root.children, vec!["home", "profile"]);

        let home = registry.resolve("home").unwrap();
        assert_eq!(home.parent.as_deref(), Some("root"));
        assert!(home.is_stack());
        assert!(!home.tabs);

        let feed = registry.resolve("feed").unwrap();
        assert_eq!(feed.parent.as_deref(), Some("home"));
        assert!(!feed.is_container());
        assert_eq!(feed.props.get("title"), Some(&json!("Feed")));
    }

    #[test]
    fn test_resolve_missing_key() {
        let registry = SceneRegistry::build(tab_app_spec(), Props::new()).unwrap();
        assert!(matches!(
            registry.resolve("nowhere"),
            Err(NavError::NotFound(msg)) if msg.contains("nowhere")
        ));
    }

    #[test]
    fn test_default_registry_has_no_root() {
        let registry = SceneRegistry::default();
        assert!(matches!(registry.root(), Err(NavError::Configuration(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let spec = SceneSpec::new("root")
            .child(SceneSpec::new("a"))
            .child(SceneSpec::new("b").child(SceneSpec::new("a")));
        let err = SceneRegistry::build(spec, Props::new()).unwrap_err();
        assert_eq!(err, NavError::Configuration("Duplicate scene key=a".to_string()));
    }

    #[test]
    fn test_alias_inherits_base_fields() {
        let spec = SceneSpec::new("root")
            .child(
                SceneSpec::new("profile")
                    .prop("title", "Profile")
                    .prop("color", "blue")
                    .cloned(),
            )
            .child(SceneSpec::new("editProfile").base("profile").prop("title", "Edit"));
        let registry = SceneRegistry::build(spec, Props::new()).unwrap();
        let alias = registry.resolve("editProfile").unwrap();
        assert_eq!(alias.props.get("title"), Some(&json!("Edit")));
        assert_eq!(alias.props.get("color"), Some(&json!("blue")));
        assert!(alias.clone);
        assert_eq!(alias.base.as_deref(), Some("profile"));
        assert_eq!(alias.scene_key, "editProfile");
    }

    #[test]
    fn test_alias_flag_overrides_base() {
        let spec = SceneSpec::new("root")
            .child(SceneSpec::new("a").cloned())
            .child(SceneSpec {
                clone: Some(false),
                ..SceneSpec::new("b").base("a")
            });
        let registry = SceneRegistry::build(spec, Props::new()).unwrap();
        assert!(!registry.resolve("b").unwrap().clone);
    }

    #[test]
    fn test_alias_chain_and_cycle() {
        let chained = SceneSpec::new("root")
            .child(SceneSpec::new("a").prop("x", 1).prop("y", 1))
            .child(SceneSpec::new("b").base("a").prop("y", 2))
            .child(SceneSpec::new("c").base("b"));
        let registry = SceneRegistry::build(chained, Props::new()).unwrap();
        let c = registry.resolve("c").unwrap();
        assert_eq!(c.props.get("x"), Some(&json!(1)));
        assert_eq!(c.props.get("y"), Some(&json!(2)));

        let cyclic = SceneSpec::new("root")
            .child(SceneSpec::new("a").base("b"))
            .child(SceneSpec::new("b").base("a"));
        assert!(matches!(
            SceneRegistry::build(cyclic, Props::new()),
            Err(NavError::Configuration(msg)) if msg.contains("cycle")
        ));

        let dangling = SceneSpec::new("root").child(SceneSpec::new("a").base("ghost"));
        assert!(matches!(
            SceneRegistry::build(dangling, Props::new()),
            Err(NavError::Configuration(msg)) if msg.contains("ghost")
        ));
    }

    #[test]
    fn test_alias_of_container_inherits_children() {
        let spec = SceneSpec::new("root")
            .child(
                SceneSpec::new("settings")
                    .tabs()
                    .child(SceneSpec::new("account"))
                    .child(SceneSpec::new("privacy").initial()),
            )
            .child(SceneSpec::new("quickSettings").base("settings"))
            .child(
                SceneSpec::new("ownTabs")
                    .base("settings")
                    .child(SceneSpec::new("about")),
            );
        let registry = SceneRegistry::build(spec, Props::new()).unwrap();

        let alias = registry.resolve("quickSettings").unwrap();
        assert!(alias.tabs);
        assert!(alias.is_container());
        assert_eq!(alias.children, vec!["account", "privacy"]);

        // children declared on the alias win
        assert_eq!(registry.resolve("ownTabs").unwrap().children, vec!["about"]);
    }

    #[test]
    fn test_is_instance_of_follows_base_chain() {
        let spec = SceneSpec::new("root")
            .child(SceneSpec::new("a"))
            .child(SceneSpec::new("b").base("a"))
            .child(SceneSpec::new("c").base("b"));
        let registry = SceneRegistry::build(spec, Props::new()).unwrap();
        assert!(registry.is_instance_of("a", "a"));
        assert!(registry.is_instance_of("c", "a"));
        assert!(!registry.is_instance_of("a", "c"));
        assert!(!registry.is_instance_of("ghost", "a"));
    }

    #[test]
    fn test_scene_key_override() {
        let spec = SceneSpec::new("root").child(SceneSpec {
            scene_key: Some("inbox".to_string()),
            ..SceneSpec::new("mail")
        });
        let registry = SceneRegistry::build(spec, Props::new()).unwrap();
        assert_eq!(registry.scene_key_for("mail"), "inbox");
        assert_eq!(registry.scene_key_for("inbox"), "inbox");
    }

    #[test]
    fn test_scene_file_from_toml() {
        let toml_str = r#"
[root_props]
nav_bar = "default"

[scene]
key = "root"
tabs = true

[[scene.children]]
key = "home"
title = "Home"

[[scene.children.children]]
key = "feed"
initial = true

[[scene.children]]
key = "profile"
"#;
        let file: SceneFile = toml::from_str(toml_str).unwrap();
        assert_eq!(file.root_props.get("nav_bar"), Some(&json!("default")));
        let registry = SceneRegistry::from_file(file).unwrap();
        assert_eq!(registry.len(), 4);
        let home = registry.resolve("home").unwrap();
        assert_eq!(home.props.get("title"), Some(&json!("Home")));
        assert!(registry.resolve("feed").unwrap().initial);
        assert!(!registry.resolve("profile").unwrap().is_container());
    }
}
