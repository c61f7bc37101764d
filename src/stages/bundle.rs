// src/stages/bundle.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::config::manifest::BundleManifest;
use crate::dag::task_info::StageConfig;
use crate::stages::destination;
use crate::stages::sourcemap::SourceMapBuilder;

/// Concatenate the manifest files of `bundle` into `<dest>/<bundle>.js`.
///
/// With `minify`, blank lines, indentation and whole-line `//` comments are
/// dropped and `preamble` is put on top. With `emit_source_map`, an inline
/// source map pointing every output line back to its source line is
/// appended.
pub fn run(
    root: &Path,
    stage: &StageConfig,
    manifest: &BundleManifest,
    bundle: &str,
    preamble: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let dest = destination(root, stage)?;
    let files = manifest
        .files(bundle)
        .ok_or_else(|| anyhow!("bundle '{bundle}' is not in the manifest"))?;

    let file_name = format!("{bundle}.js");
    let mut out = String::new();
    let mut map = SourceMapBuilder::new(file_name.clone());

    if stage.minify {
        for line in preamble.unwrap_or_default().lines() {
            out.push_str(line);
            out.push('\n');
            map.push_unmapped();
        }
    }

    for rel in files {
        let path = root.join(rel);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading bundle source {}", path.display()))?;
        let source = map.add_source(rel.as_str(), text.as_str());

        for (idx, line) in text.lines().enumerate() {
            let line = if stage.minify {
                match minify_line(line) {
                    Some(l) => l,
                    None => continue,
                }
            } else {
                line
            };
            out.push_str(line);
            out.push('\n');
            map.push_mapped(source, idx);
        }
    }

    if stage.emit_source_map {
        out.push_str(&map.inline_comment()?);
        out.push('\n');
    }

    fs::create_dir_all(&dest).with_context(|| format!("creating {}", dest.display()))?;
    let target = dest.join(&file_name);
    fs::write(&target, out).with_context(|| format!("writing {}", target.display()))?;
    debug!(bundle, files = files.len(), target = %target.display(), "wrote bundle");

    Ok(vec![target])
}

/// The line as it appears in minified output, or `None` to drop it.
pub fn minify_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("//") {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task_info::StageKind;

    fn project() -> (tempfile::TempDir, BundleManifest) {
        let dir = tempfile::tempdir().unwrap();
        let js = dir.path().join("source/js");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("a.js"), "// header\nfunction a() {\n    return 1;\n}\n").unwrap();
        fs::write(js.join("b.js"), "\nvar b = a();\n").unwrap();
        let manifest =
            BundleManifest::from_json(r#"{"desktop": ["source/js/a.js", "source/js/b.js"]}"#)
                .unwrap();
        (dir, manifest)
    }

    fn stage(minify: bool, source_map: bool) -> StageConfig {
        StageConfig {
            kind: StageKind::Bundle {
                bundle: "desktop".into(),
                preamble: None,
            },
            destination: Some("out/js".into()),
            minify,
            emit_source_map: source_map,
            ..StageConfig::none()
        }
    }

    #[test]
    fn plain_concatenation_keeps_every_line() {
        let (dir, manifest) = project();
        let out = run(dir.path(), &stage(false, false), &manifest, "desktop", None).unwrap();
        let text = fs::read_to_string(&out[0]).unwrap();
        assert_eq!(
            text,
            "// header\nfunction a() {\n    return 1;\n}\n\nvar b = a();\n"
        );
    }

    #[test]
    fn minify_strips_and_adds_preamble() {
        let (dir, manifest) = project();
        let out = run(
            dir.path(),
            &stage(true, false),
            &manifest,
            "desktop",
            Some("/* (c) app */"),
        )
        .unwrap();
        let text = fs::read_to_string(&out[0]).unwrap();
        assert_eq!(
            text,
            "/* (c) app */\nfunction a() {\nreturn 1;\n}\nvar b = a();\n"
        );
    }

    #[test]
    fn inline_source_map_is_appended() {
        let (dir, manifest) = project();
        let out = run(dir.path(), &stage(true, true), &manifest, "desktop", None).unwrap();
        let text = fs::read_to_string(&out[0]).unwrap();
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));
    }

    #[test]
    fn missing_source_file_fails_with_path() {
        let (dir, _) = project();
        let manifest = BundleManifest::from_json(r#"{"desktop": ["source/js/nope.js"]}"#).unwrap();
        let err = run(dir.path(), &stage(false, false), &manifest, "desktop", None).unwrap_err();
        assert!(format!("{err:#}").contains("nope.js"));
    }
}
