//! Legacy manifest to project document translation
//!
//! Walks the `dependencies` and `assets` sections of a legacy manifest and
//! produces the equivalent project document. Every declaration that is
//! translated (or deliberately dropped) is removed from the legacy tree, so
//! whatever remains afterwards is exactly the leftover manifest to persist
//! for a later run.
//!
//! Declarations naming a plugin or loader the registry does not know are
//! left in place and reported as [`UnknownReference`]s; structural problems
//! are [`ConvertError::MalformedManifest`] and abort the whole conversion.

use std::fmt;

use tracing::debug;

use crate::error::ConvertError;
use crate::node::{Location, Mapping, Node};
use crate::registry::Registry;

/// Value of the leading `version` key of every project document
pub const SCHEMA_VERSION: &str = "1";

/// Loader handled by the host itself; dropped without output
const BUILTIN_PLUGIN: &str = "deli";
const BUILTIN_LOADER: &str = "assembly";

/// Outcome of translating one manifest
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// The generated project document (a mapping)
    pub document: Node,
    /// True when nothing translatable is left in the legacy manifest
    pub fully_converted: bool,
    /// Declarations left untranslated
    pub left_behind: Vec<UnknownReference>,
}

/// A declaration naming something the registry does not know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownReference {
    pub kind: UnknownKind,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownKind {
    /// The plugin identifier is not registered
    Plugin(String),
    /// The plugin is registered but has no such loader
    Loader { plugin: String, loader: String },
}

impl fmt::Display for UnknownReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            UnknownKind::Plugin(plugin) => write!(f, "unknown plugin '{plugin}'")?,
            UnknownKind::Loader { plugin, loader } => {
                write!(f, "unknown loader '{loader}' of plugin '{plugin}'")?
            }
        }
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

enum Declaration {
    Translated(Node),
    Dropped,
    LeftBehind(UnknownReference),
}

/// Translates legacy manifests using a shared [`Registry`]
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    registry: &'a Registry,
}

impl<'a> Translator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Translate `manifest`, removing every consumed declaration from it.
    ///
    /// On error the manifest may be partially reduced and must be discarded.
    pub fn translate(&self, manifest: &mut Node) -> Result<ConversionResult, ConvertError> {
        let root = expect_mapping(manifest, "manifest root")?;

        let mut document = Mapping::new();
        document.insert("version", Node::plain(SCHEMA_VERSION))?;

        let mut left_behind = Vec::new();

        if let Some(dependencies) = root.get_mut("dependencies") {
            document.insert(
                "dependencies",
                self.dependencies(dependencies, &mut left_behind)?,
            )?;
        }

        if let Some(assets) = root.get_mut("assets") {
            document.insert("assets", self.assets(assets, &mut left_behind)?)?;
        }

        let fully_converted = ["dependencies", "assets"]
            .iter()
            .all(|section| root.get(section).is_none_or(Node::is_structurally_empty));

        Ok(ConversionResult {
            document: document.into(),
            fully_converted,
            left_behind,
        })
    }

    fn dependencies(
        &self,
        dependencies: &mut Node,
        left_behind: &mut Vec<UnknownReference>,
    ) -> Result<Node, ConvertError> {
        let dependencies = expect_mapping(dependencies, "dependencies")?;

        let mut hard = Mapping::new();
        let mut consumed = Vec::new();

        for (plugin, version) in dependencies.iter() {
            if version.as_str().is_none() {
                return Err(ConvertError::malformed(
                    format!("Invalid dependency '{plugin}': version must be a string"),
                    version.location.clone(),
                ));
            }

            match self.registry.lookup_plugin(plugin) {
                Some(entry) => {
                    hard.insert(entry.guid.clone(), Node::quoted(entry.version.clone()))?;
                    consumed.push(plugin.to_string());
                }
                None => {
                    let reference = UnknownReference {
                        kind: UnknownKind::Plugin(plugin.to_string()),
                        location: version.location.clone(),
                    };
                    debug!("Leaving dependency behind: {reference}");
                    left_behind.push(reference);
                }
            }
        }

        for plugin in consumed {
            dependencies.remove(&plugin);
        }

        let mut output = Mapping::new();
        output.insert("hard", hard.into())?;
        Ok(output.into())
    }

    fn assets(
        &self,
        assets: &mut Node,
        left_behind: &mut Vec<UnknownReference>,
    ) -> Result<Node, ConvertError> {
        let assets = expect_mapping(assets, "assets")?;
        let mut output = Mapping::new();

        if let Some(patcher) = assets.get("patcher") {
            if has_content(patcher) {
                return Err(ConvertError::malformed(
                    "Mod contained patcher assets, which the new loader cannot represent",
                    patcher.location.clone(),
                ));
            }
            // An empty section declares nothing and must not count as a leftover
            assets.remove("patcher");
        }

        if let Some(setup) = assets.get_mut("setup") {
            let setup = expect_mapping(setup, "assets.setup")?;
            let converted = self.declarations(setup, left_behind)?;
            output.insert("setup", Node::sequence(converted))?;
        }

        if let Some(runtime) = assets.get_mut("runtime") {
            let runtime = expect_mapping(runtime, "assets.runtime")?;
            // Each runtime asset gets its own group so it can be toggled alone
            let nested = self
                .declarations(runtime, left_behind)?
                .into_iter()
                .map(|asset| {
                    let mut group = Mapping::new();
                    group.push_unchecked("assets".to_string(), Node::sequence(vec![asset]));
                    Node::from(group)
                })
                .collect();

            let mut runtime_output = Mapping::new();
            runtime_output.insert("nested", Node::sequence(nested))?;
            output.insert("runtime", runtime_output.into())?;
        }

        Ok(output.into())
    }

    /// Translate a section of `path: "plugin:loader"` declarations.
    fn declarations(
        &self,
        section: &mut Mapping,
        left_behind: &mut Vec<UnknownReference>,
    ) -> Result<Vec<Node>, ConvertError> {
        let mut converted = Vec::new();
        let mut consumed = Vec::new();

        for (path, value) in section.iter() {
            match self.declaration(path, value)? {
                Declaration::Translated(asset) => {
                    converted.push(asset);
                    consumed.push(path.to_string());
                }
                Declaration::Dropped => consumed.push(path.to_string()),
                Declaration::LeftBehind(reference) => {
                    debug!("Leaving asset '{path}' behind: {reference}");
                    left_behind.push(reference);
                }
            }
        }

        for path in consumed {
            section.remove(&path);
        }

        Ok(converted)
    }

    fn declaration(&self, path: &str, value: &Node) -> Result<Declaration, ConvertError> {
        let raw = value.as_str().ok_or_else(|| {
            ConvertError::malformed(
                format!("Invalid asset '{path}': loader must be a string"),
                value.location.clone(),
            )
        })?;

        let (plugin, loader) = match raw.split(':').collect::<Vec<_>>().as_slice() {
            [plugin, loader] => (*plugin, *loader),
            _ => {
                return Err(ConvertError::malformed(
                    format!(
                        "Invalid asset '{path}': loaders must be a plugin GUID and loader name separated by a single colon, found '{raw}'"
                    ),
                    value.location.clone(),
                ));
            }
        };

        if plugin == BUILTIN_PLUGIN && loader == BUILTIN_LOADER {
            return Ok(Declaration::Dropped);
        }

        let Some(entry) = self.registry.lookup_plugin(plugin) else {
            return Ok(Declaration::LeftBehind(UnknownReference {
                kind: UnknownKind::Plugin(plugin.to_string()),
                location: value.location.clone(),
            }));
        };

        let Some(new_loader) = self.registry.lookup_loader(entry, loader) else {
            return Ok(Declaration::LeftBehind(UnknownReference {
                kind: UnknownKind::Loader {
                    plugin: plugin.to_string(),
                    loader: loader.to_string(),
                },
                location: value.location.clone(),
            }));
        };

        let mut asset = Mapping::new();
        asset.push_unchecked("path".to_string(), Node::quoted(path));
        asset.push_unchecked("plugin".to_string(), Node::plain(entry.guid.clone()));
        asset.push_unchecked("loader".to_string(), Node::plain(new_loader));
        Ok(Declaration::Translated(asset.into()))
    }
}

fn expect_mapping<'n>(node: &'n mut Node, what: &str) -> Result<&'n mut Mapping, ConvertError> {
    let location = node.location.clone();
    node.as_mapping_mut()
        .ok_or_else(|| ConvertError::malformed(format!("{what} must be an object"), location))
}

/// Whether a patcher section declares anything (`null` and `{}` do not).
fn has_content(patcher: &Node) -> bool {
    match patcher.as_scalar() {
        Some(value) => value != "null",
        None => !patcher.is_structurally_empty(),
    }
}
