//! Test utilities for metal unit tests.
//!
//! [`TestProject`] lays out a throwaway project tree, and
//! [`fake_compiler`] installs a shell script that behaves like a clang
//! driver closely enough for the dispatcher: it writes its `--output=` file,
//! refuses to run when a `-fmodule-file=` BMI is missing, and fails for any
//! source containing `FAIL_COMPILE`.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::manifest::MANIFEST_NAME;

/// Marker that makes the fake compiler fail on a source.
pub const FAIL_MARKER: &str = "FAIL_COMPILE";

pub const FAKE_COMPILER_SCRIPT: &str = r#"#!/bin/sh
out=""
src=""
for arg in "$@"; do
  case "$arg" in
    --output=*) out="${arg#--output=}" ;;
    -fmodule-file=*)
      bmi="${arg#-fmodule-file=}"
      bmi="${bmi#*=}"
      if [ ! -f "$bmi" ]; then
        echo "fatal error: module file '$bmi' not found" >&2
        exit 3
      fi
      ;;
    -*) ;;
    *) src="$arg" ;;
  esac
done
if grep -q FAIL_COMPILE "$src" 2>/dev/null; then
  echo "$src:1:1: error: forced failure" >&2
  exit 1
fi
mkdir -p "$(dirname "$out")"
printf '%s\n' "$@" > "$out"
"#;

/// Write the fake compiler into `dir` and return its path.
#[cfg(unix)]
pub fn fake_compiler(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-cc");
    std::fs::write(&path, FAKE_COMPILER_SCRIPT).expect("failed to write fake compiler");
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A temporary project directory.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        TestProject {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project root, creating parents.
    pub fn file(&self, rel: &str, contents: &str) -> &Self {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, contents).expect("failed to write file");
        self
    }

    pub fn manifest(&self, contents: &str) -> &Self {
        self.file(MANIFEST_NAME, contents)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join(MANIFEST_NAME)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel))
            .unwrap_or_else(|_| panic!("failed to read {}", rel))
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A `[toolchain]` table pointing both drivers at `compiler`.
pub fn toolchain_table(compiler: &Path) -> String {
    format!(
        "[toolchain]\ncc = {:?}\ncxx = {:?}\n",
        compiler.display().to_string(),
        compiler.display().to_string()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_files() {
        let project = TestProject::new();
        project
            .manifest("[project]\nname = \"demo\"\n")
            .file("src/main/c/main.c", "int main(void) { return 0; }\n");

        assert!(project.manifest_path().is_file());
        assert!(project.exists("src/main/c/main.c"));
        assert!(project.read("Metal.toml").contains("demo"));
    }

    #[test]
    fn test_toolchain_table_is_valid_toml() {
        let table = toolchain_table(Path::new("/tmp/fake-cc"));
        let value: toml::Value = toml::from_str(&table).unwrap();
        assert_eq!(value["toolchain"]["cc"].as_str(), Some("/tmp/fake-cc"));
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_compiler_writes_output() {
        use crate::util::process::ProcessBuilder;

        let project = TestProject::new();
        project.file("a.c", "int a;\n").file("bad.c", FAIL_MARKER);
        let cc = fake_compiler(project.root());

        let out = project.path("out/a.o");
        let output = ProcessBuilder::new(&cc)
            .arg("--compile")
            .arg(format!("--output={}", out.display()))
            .arg(project.path("a.c"))
            .exec()
            .unwrap();
        assert!(output.status.success());
        assert!(out.is_file());

        let output = ProcessBuilder::new(&cc)
            .arg(format!("--output={}", project.path("out/bad.o").display()))
            .arg(project.path("bad.c"))
            .exec()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&output.stderr).contains("forced failure"));
    }
}
