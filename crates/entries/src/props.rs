//! Property lists and the cached-property ("wcprop") store.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use adm::{Element, codec, fsutil, layout};

use crate::error::EntriesError;

/// A property list: name to value, in name order.
pub type PropertyList = BTreeMap<String, String>;

/// End-of-line style property.
pub const PROP_EOL_STYLE: &str = "svn:eol-style";
/// Keyword-expansion property.
pub const PROP_KEYWORDS: &str = "svn:keywords";
/// Executable-bit property.
pub const PROP_EXECUTABLE: &str = "svn:executable";
/// Special-file (symlink) property.
pub const PROP_SPECIAL: &str = "svn:special";
/// Needs-lock property: working file stays read-only until locked.
pub const PROP_NEEDS_LOCK: &str = "svn:needs-lock";
/// MIME type property.
pub const PROP_MIME_TYPE: &str = "svn:mime-type";

/// Reads the property list stored at `path`.
///
/// A missing file is an empty list; property files are deleted rather
/// than left empty.
pub fn read_prop_file(path: &Path) -> Result<PropertyList, EntriesError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Ok(PropertyList::new());
        }
        Err(error) => {
            return Err(EntriesError::io(
                "read property file",
                path.to_path_buf(),
                error,
            ));
        }
    };
    let mut props = PropertyList::new();
    for element in codec::parse_all(&text)? {
        if element.tag() != "property" {
            return Err(EntriesError::Malformed {
                path: path.to_path_buf(),
                detail: format!("unexpected element '{}'", element.tag()),
            });
        }
        let name = element.attr("name").ok_or_else(|| EntriesError::Malformed {
            path: path.to_path_buf(),
            detail: "property without a name".to_owned(),
        })?;
        let value = element.attr("value").unwrap_or_default();
        props.insert(name.to_owned(), value.to_owned());
    }
    Ok(props)
}

/// Writes `props` to `path` atomically. An empty list removes the file.
pub fn write_prop_file(path: &Path, props: &PropertyList) -> Result<(), EntriesError> {
    if props.is_empty() {
        fsutil::remove_file_if_present(path)
            .map(|_| ())
            .map_err(|error| EntriesError::io("remove property file", path.to_path_buf(), error))
    } else {
        let elements: Vec<_> = props
            .iter()
            .map(|(name, value)| {
                Element::new("property")
                    .with_attr("name", name.clone())
                    .with_attr("value", value.clone())
            })
            .collect();
        fsutil::write_atomic(path, codec::write_all(&elements).as_bytes())
            .map_err(|error| EntriesError::io("write property file", path.to_path_buf(), error))
    }
}

/// The cached-property store of one directory: per-target property lists
/// persisted in a single administrative file.
///
/// Cached properties are bookkeeping the repository layer attaches to
/// entries (wire versions, cache tokens); they are not versioned
/// properties and never reach the working file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WcPropStore {
    targets: BTreeMap<String, PropertyList>,
}

impl WcPropStore {
    /// Loads the store of `dir`. A missing file yields an empty store.
    pub fn read(dir: &Path) -> Result<Self, EntriesError> {
        let path = layout::adm_path(dir, &[layout::ADM_WCPROPS]);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => {
                return Err(EntriesError::io("read cached properties", path, error));
            }
        };
        let mut store = Self::default();
        for element in codec::parse_all(&text)? {
            if element.tag() != "wcprop" {
                return Err(EntriesError::Malformed {
                    path,
                    detail: format!("unexpected element '{}'", element.tag()),
                });
            }
            let target = element.attr("name").unwrap_or_default().to_owned();
            let name = element
                .attr("propname")
                .ok_or_else(|| EntriesError::Malformed {
                    path: path.clone(),
                    detail: "wcprop without propname".to_owned(),
                })?;
            let value = element.attr("propval").unwrap_or_default();
            store
                .targets
                .entry(target)
                .or_default()
                .insert(name.to_owned(), value.to_owned());
        }
        Ok(store)
    }

    /// Persists the store atomically. An empty store removes the file.
    pub fn write(&self, dir: &Path) -> Result<(), EntriesError> {
        let path = layout::adm_path(dir, &[layout::ADM_WCPROPS]);
        if self.targets.iter().all(|(_, props)| props.is_empty()) {
            return fsutil::remove_file_if_present(&path)
                .map(|_| ())
                .map_err(|error| EntriesError::io("remove cached properties", path, error));
        }
        let mut elements = Vec::new();
        for (target, props) in &self.targets {
            for (name, value) in props {
                elements.push(
                    Element::new("wcprop")
                        .with_attr("name", target.clone())
                        .with_attr("propname", name.clone())
                        .with_attr("propval", value.clone()),
                );
            }
        }
        fsutil::write_atomic(&path, codec::write_all(&elements).as_bytes())
            .map_err(|error| EntriesError::io("write cached properties", path, error))
    }

    /// Returns the property list cached for `target`, if any.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&PropertyList> {
        self.targets.get(target)
    }

    /// Sets one cached property for `target`.
    pub fn set(&mut self, target: &str, name: &str, value: &str) {
        self.targets
            .entry(target.to_owned())
            .or_default()
            .insert(name.to_owned(), value.to_owned());
    }

    /// Removes one cached property from `target`.
    pub fn remove(&mut self, target: &str, name: &str) {
        if let Some(props) = self.targets.get_mut(target) {
            props.remove(name);
            if props.is_empty() {
                self.targets.remove(target);
            }
        }
    }

    /// Drops every cached property of `target`.
    pub fn remove_target(&mut self, target: &str) {
        self.targets.remove(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prop_file_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("props");
        let mut props = PropertyList::new();
        props.insert(PROP_EOL_STYLE.to_owned(), "native".to_owned());
        props.insert(PROP_KEYWORDS.to_owned(), "Revision Date".to_owned());
        write_prop_file(&path, &props).unwrap();
        assert_eq!(read_prop_file(&path).unwrap(), props);
    }

    #[test]
    fn empty_list_removes_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("props");
        let mut props = PropertyList::new();
        props.insert("a".to_owned(), "b".to_owned());
        write_prop_file(&path, &props).unwrap();
        write_prop_file(&path, &PropertyList::new()).unwrap();
        assert!(!path.exists());
        assert!(read_prop_file(&path).unwrap().is_empty());
    }

    #[test]
    fn wcprop_store_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        adm::layout::create_adm_area(temp.path()).unwrap();
        let mut store = WcPropStore::default();
        store.set("foo", "svn:wc:ra_dav:version-url", "/repo/!svn/ver/7/foo");
        store.set("", "svn:wc:ra_dav:version-url", "/repo/!svn/ver/7");
        store.write(temp.path()).unwrap();
        let loaded = WcPropStore::read(temp.path()).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn remove_last_prop_drops_target() {
        let mut store = WcPropStore::default();
        store.set("foo", "k", "v");
        store.remove("foo", "k");
        assert!(store.get("foo").is_none());
    }
}
