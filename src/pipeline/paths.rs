//! Path bookkeeping for one conversion.
//!
//! Given `uploads/cube.obj` and the default work dir, a conversion writes
//!
//! ```text
//! output/cube.u3d        intermediate scene
//! output/pdf/cube.pdf    final document (unless an output path is given)
//! ```

use crate::error::Mesh2PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Subdirectory of the work dir that receives documents by default.
pub const DOCUMENT_SUBDIR: &str = "pdf";

/// Every path a conversion touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPaths {
    /// Input file name without its extension.
    pub base_name: String,
    /// `<work_dir>/<base>.u3d`
    pub interchange: PathBuf,
    /// `<work_dir>/pdf/<base>.pdf`, or the caller's explicit path.
    pub document: PathBuf,
}

impl ConversionPaths {
    /// Derive paths from the input's base name.
    pub fn derive(
        input: &Path,
        output: Option<&Path>,
        work_dir: &Path,
    ) -> Result<Self, Mesh2PdfError> {
        let base_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Mesh2PdfError::UnsupportedExtension {
                path: input.to_path_buf(),
            })?;

        let interchange = work_dir.join(format!("{base_name}.u3d"));
        let document = match output {
            Some(p) => p.to_path_buf(),
            None => work_dir
                .join(DOCUMENT_SUBDIR)
                .join(format!("{base_name}.pdf")),
        };

        Ok(Self {
            base_name,
            interchange,
            document,
        })
    }

    /// Create the parent directories of both outputs.
    pub async fn ensure_dirs(&self) -> Result<(), Mesh2PdfError> {
        for path in [&self.interchange, &self.document] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Mesh2PdfError::OutputWriteFailed {
                        path: parent.to_path_buf(),
                        source: e,
                    }
                })?;
            }
        }
        Ok(())
    }
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());
/// Last component of a client-supplied name, split on `/` and `\`.
/// Last component of a client-supplied name, split on `/` and `\\`.
pub fn base_file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Reduce a client-supplied file name to `[A-Za-z0-9]+` plus its extension.
///
/// Directory components are dropped first, so `../../etc/x.obj` becomes
/// `x.obj`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = base_file_name(name);
    let (stem, ext) = match base.rfind('.') {
        Some(i) if i > 0 => (&base[..i], &base[i + 1..]),
        _ => (base, ""),
    };
    let stem = NON_ALNUM.replace_all(stem, "");
    let ext = NON_ALNUM.replace_all(ext, "");
    if ext.is_empty() {
        stem.into_owned()
    } else {
        format!("{stem}.{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let p = ConversionPaths::derive(Path::new("uploads/cube.obj"), None, Path::new("output"))
            .unwrap();
        assert_eq!(p.base_name, "cube");
        assert_eq!(p.interchange, PathBuf::from("output/cube.u3d"));
        assert_eq!(p.document, PathBuf::from("output/pdf/cube.pdf"));
    }

    #[test]
    fn explicit_output_wins() {
        let p = ConversionPaths::derive(
            Path::new("cube.obj"),
            Some(Path::new("/srv/out/x.pdf")),
            Path::new("output"),
        )
        .unwrap();
        assert_eq!(p.document, PathBuf::from("/srv/out/x.pdf"));
        assert_eq!(p.interchange, PathBuf::from("output/cube.u3d"));
    }

    #[test]
    fn sanitize_strips_everything_but_alnum() {
        assert_eq!(sanitize_file_name("my cube (v2).obj"), "mycubev2.obj");
        assert_eq!(sanitize_file_name("../../etc/pass-wd.obj"), "passwd.obj");
        assert_eq!(sanitize_file_name("C:\\models\\Bolt_M8.OBJ"), "BoltM8.OBJ");
        assert_eq!(sanitize_file_name("noext"), "noext");
    }

    #[test]
    fn sanitize_job_qualified_name() {
        let name = sanitize_file_name("1b4e28ba-2fa1-11d2-883f-0016d3cca427_cube.obj");
        assert_eq!(name, "1b4e28ba2fa111d2883f0016d3cca427cube.obj");
    }

    #[test]
    fn prefix_survives_client_directories() {
        let id = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";
        for client in ["models/cube.obj", "C:\\models\\cube.obj"] {
            let name = sanitize_file_name(&format!("{id}_{}", base_file_name(client)));
            assert_eq!(name, "1b4e28ba2fa111d2883f0016d3cca427cube.obj");
        }
    }

    #[test]
    fn ensure_dirs_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let p = ConversionPaths::derive(Path::new("cube.obj"), None, &dir.path().join("output"))
            .unwrap();
        tokio_test::block_on(p.ensure_dirs()).unwrap();
        assert!(dir.path().join("output/pdf").is_dir());
    }
}
