//! Project and host config documents
//!
//! `project.yaml` accumulates the translated declarations of a package
//! across runs; `config.yaml` points the new loader at the host's
//! directories. Both are written as UTF-8 without a byte-order mark.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;
use crate::merge::merge;
use crate::node::{Mapping, Node};

/// Project document written next to each converted package
pub const PROJECT_FILE: &str = "project.yaml";

/// Host config document written next to each converted package
pub const HOST_CONFIG_FILE: &str = "config.yaml";

/// Host directories exposed through `config.yaml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    /// Directory holding installed plugins
    pub plugins: PathBuf,
    /// Directory holding host configuration
    pub config: PathBuf,
}

/// Load the existing project document of a package.
///
/// A missing or empty file is an empty mapping.
pub fn load_project(package_dir: &Path) -> Result<Node, ConvertError> {
    let path = package_dir.join(PROJECT_FILE);
    if !path.exists() {
        return Ok(Node::mapping());
    }

    let content = fs::read_to_string(&path).map_err(ConvertError::io(&path))?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    match serde_yaml::from_str::<serde_yaml::Value>(content)? {
        serde_yaml::Value::Null => Ok(Node::mapping()),
        value => Node::from_yaml(value),
    }
}

/// Fold `document` into the package's existing project document.
pub fn merge_project(package_dir: &Path, document: Node) -> Result<Node, ConvertError> {
    let mut existing = load_project(package_dir)?;
    merge(&mut existing, document)?;
    Ok(existing)
}

/// Render a document as YAML.
pub fn to_yaml(document: &Node) -> Result<String, ConvertError> {
    Ok(serde_yaml::to_string(document)?)
}

/// Write a project document to `project.yaml`.
pub fn write_project(package_dir: &Path, document: &Node) -> Result<(), ConvertError> {
    write_atomic(&package_dir.join(PROJECT_FILE), &to_yaml(document)?)
}

/// Write `config.yaml` exposing the host directories.
pub fn write_host_config(package_dir: &Path, host: &HostPaths) -> Result<(), ConvertError> {
    let mut directories = Mapping::new();
    directories.insert("plugins", Node::quoted(host.plugins.display().to_string()))?;
    directories.insert("config", Node::quoted(host.config.display().to_string()))?;

    let mut root = Mapping::new();
    root.insert("directories", directories.into())?;

    write_atomic(&package_dir.join(HOST_CONFIG_FILE), &to_yaml(&Node::from(root))?)
}

/// The bytes of `project.yaml` before a conversion wrote it
#[derive(Debug)]
pub struct ProjectSnapshot {
    path: PathBuf,
    contents: Option<Vec<u8>>,
}

impl ProjectSnapshot {
    pub fn take(package_dir: &Path) -> Result<Self, ConvertError> {
        let path = package_dir.join(PROJECT_FILE);
        let contents = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(ConvertError::io(&path)(e)),
        };
        Ok(Self { path, contents })
    }

    /// Put `project.yaml` back the way it was, removing it if it did not exist.
    pub fn restore(&self) -> Result<(), ConvertError> {
        match &self.contents {
            Some(bytes) => fs::write(&self.path, bytes).map_err(ConvertError::io(&self.path)),
            None if self.path.exists() => {
                fs::remove_file(&self.path).map_err(ConvertError::io(&self.path))
            }
            None => Ok(()),
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ConvertError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents.as_bytes()).map_err(ConvertError::io(&tmp))?;
    fs::rename(&tmp, path).map_err(ConvertError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn document(guid: &str, version: &str) -> Node {
        let mut hard = Mapping::new();
        hard.insert(guid, Node::quoted(version)).unwrap();
        let mut dependencies = Mapping::new();
        dependencies.insert("hard", hard.into()).unwrap();
        let mut root = Mapping::new();
        root.insert("version", Node::plain("1")).unwrap();
        root.insert("dependencies", dependencies.into()).unwrap();
        root.into()
    }

    #[test]
    fn load_missing_project_is_empty_mapping() {
        let temp = TempDir::new().unwrap();
        assert_eq!(load_project(temp.path()).unwrap(), Node::mapping());
    }

    #[test]
    fn load_empty_project_is_empty_mapping() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_FILE), "").unwrap();
        assert_eq!(load_project(temp.path()).unwrap(), Node::mapping());
    }

    #[test]
    fn merge_project_keeps_unrelated_keys() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_FILE),
            "version: 1\nauthor: someone\ndependencies:\n  hard:\n    a.b: '1.0'\n",
        )
        .unwrap();

        let merged = merge_project(temp.path(), document("c.d", "2.0")).unwrap();

        assert_eq!(merged.pointer(&["author"]), Some(&Node::quoted("someone")));
        assert_eq!(
            merged.pointer(&["dependencies", "hard", "a.b"]),
            Some(&Node::quoted("1.0"))
        );
        assert_eq!(
            merged.pointer(&["dependencies", "hard", "c.d"]),
            Some(&Node::quoted("2.0"))
        );
    }

    #[test]
    fn merge_project_reports_schema_mismatch() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_FILE), "dependencies: [1, 2]\n").unwrap();

        let err = merge_project(temp.path(), document("c.d", "2.0")).unwrap_err();
        assert!(matches!(err, ConvertError::SchemaMismatch { .. }));
    }

    #[test]
    fn write_project_has_no_byte_order_mark() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path(), &document("a.b", "1.0")).unwrap();

        let bytes = fs::read(temp.path().join(PROJECT_FILE)).unwrap();
        assert!(!bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
        assert!(String::from_utf8(bytes).unwrap().starts_with("version: 1\n"));
    }

    #[test]
    fn write_then_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let original = document("a.b", "1.0");
        write_project(temp.path(), &original).unwrap();

        assert_eq!(load_project(temp.path()).unwrap(), original);
    }

    #[test]
    fn snapshot_restores_previous_project() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_FILE), "version: 1\nauthor: me\n").unwrap();

        let snapshot = ProjectSnapshot::take(temp.path()).unwrap();
        write_project(temp.path(), &document("a.b", "1.0")).unwrap();
        snapshot.restore().unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join(PROJECT_FILE)).unwrap(),
            "version: 1\nauthor: me\n"
        );
    }

    #[test]
    fn snapshot_of_missing_project_removes_it() {
        let temp = TempDir::new().unwrap();

        let snapshot = ProjectSnapshot::take(temp.path()).unwrap();
        write_project(temp.path(), &document("a.b", "1.0")).unwrap();
        snapshot.restore().unwrap();

        assert!(!temp.path().join(PROJECT_FILE).exists());
    }

    #[test]
    fn host_config_lists_directories() {
        let temp = TempDir::new().unwrap();
        let host = HostPaths {
            plugins: PathBuf::from("/game/BepInEx/plugins"),
            config: PathBuf::from("/game/BepInEx/config"),
        };

        write_host_config(temp.path(), &host).unwrap();

        let content = fs::read_to_string(temp.path().join(HOST_CONFIG_FILE)).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
        assert_eq!(value["directories"]["plugins"], "/game/BepInEx/plugins");
        assert_eq!(value["directories"]["config"], "/game/BepInEx/config");
    }
}
