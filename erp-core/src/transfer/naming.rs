use std::path::PathBuf;

use crate::error::{ErpError, Result};
use crate::model::resource::Resource;

/// Where a resource lands on disk, relative to the export root.
///
/// `eaid://character_package/idf/gloves.emb?context=default` becomes
/// `character_package/idf/gloves!context=default.emb`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputName {
    dirs: Vec<String>,
    stem: String,
    query: Option<String>,
    ext: Option<String>,
}

impl OutputName {
    pub fn for_resource(resource: &Resource) -> Result<Self> {
        Self::parse(resource.identifier(), resource.resource_type())
    }

    pub fn parse(identifier: &str, resource_type: &str) -> Result<Self> {
        let rest = identifier
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(identifier);
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let mut segments = Vec::new();
        for seg in path.split(['/', '\\']) {
            match seg {
                "" => continue,
                "." | ".." => {
                    return Err(ErpError::InvalidInput(format!(
                        "unsafe path segment in {identifier}"
                    )));
                }
                s => segments.push(sanitize(s)),
            }
        }
        let leaf = segments
            .pop()
            .ok_or_else(|| ErpError::InvalidInput(format!("no file name in {identifier}")))?;

        let (stem, ext) = match leaf.rfind('.') {
            Some(dot) if dot > 0 && dot + 1 < leaf.len() => {
                (leaf[..dot].to_string(), Some(leaf[dot + 1..].to_string()))
            }
            _ => {
                let ty = sanitize(&resource_type.trim().to_lowercase());
                (leaf, (!ty.is_empty()).then_some(ty))
            }
        };

        Ok(Self {
            dirs: segments,
            stem,
            query: query.filter(|q| !q.is_empty()).map(sanitize),
            ext,
        })
    }

    /// File name of the first fragment; filters match against this.
    pub fn file_name(&self) -> String {
        self.compose(None)
    }

    /// File name for fragment `index`; fragment 0 uses the plain name.
    pub fn fragment_file_name(&self, index: usize) -> String {
        if index == 0 {
            self.compose(None)
        } else {
            self.compose(Some(index))
        }
    }

    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    pub fn relative_path(&self) -> PathBuf {
        self.fragment_path(0)
    }

    pub fn fragment_path(&self, index: usize) -> PathBuf {
        let mut p: PathBuf = self.dirs.iter().collect();
        p.push(self.fragment_file_name(index));
        p
    }

    pub fn matches_filter(&self, suffix: Option<&str>) -> bool {
        match suffix {
            Some(s) if !s.is_empty() => self.file_name().ends_with(s),
            _ => true,
        }
    }

    fn compose(&self, fragment: Option<usize>) -> String {
        let mut name = self.stem.clone();
        if let Some(q) = &self.query {
            name.push('!');
            name.push_str(q);
        }
        if let Some(i) = fragment {
            name.push_str(&format!(".frag{i}"));
        }
        if let Some(ext) = &self.ext {
            name.push('.');
            name.push_str(ext);
        }
        name
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn segments_become_directories() {
        let n = OutputName::parse("eaid://x/y/a.mat", "Material").unwrap();
        assert_eq!(n.dirs(), &["x".to_string(), "y".to_string()]);
        assert_eq!(n.file_name(), "a.mat");
        assert_eq!(n.relative_path(), Path::new("x").join("y").join("a.mat"));
    }

    #[test]
    fn query_goes_before_extension() {
        let n = OutputName::parse(
            "eaid://character_package/condition_scene/idf/driver_gloves.emb?context=2020-haas_x",
            "",
        )
        .unwrap();
        assert_eq!(n.file_name(), "driver_gloves!context=2020-haas_x.emb");
        assert!(n.matches_filter(Some(".emb")));
    }

    #[test]
    fn missing_extension_uses_type() {
        let n = OutputName::parse("eaid://tex/rock", "Texture").unwrap();
        assert_eq!(n.file_name(), "rock.texture");
        let n = OutputName::parse("eaid://tex/rock", "").unwrap();
        assert_eq!(n.file_name(), "rock");
    }

    #[test]
    fn later_fragments_get_an_index() {
        let n = OutputName::parse("eaid://tex/rock.tga", "Texture").unwrap();
        assert_eq!(n.fragment_file_name(0), "rock.tga");
        assert_eq!(n.fragment_file_name(2), "rock.frag2.tga");
    }

    #[test]
    fn unsafe_identifiers_are_rejected() {
        assert!(OutputName::parse("eaid://x/../../etc/passwd", "").is_err());
        assert!(OutputName::parse("eaid://", "").is_err());
        let n = OutputName::parse("eaid://x/we*ird:name.mat", "").unwrap();
        assert_eq!(n.file_name(), "we_ird_name.mat");
    }

    #[test]
    fn empty_filter_matches_everything() {
        let n = OutputName::parse("eaid://x/a.tex", "").unwrap();
        assert!(n.matches_filter(None));
        assert!(n.matches_filter(Some("")));
        assert!(!n.matches_filter(Some(".mat")));
    }
}
