//! CLI integration tests for geno.
//!
//! These tests drive the binary from workspace creation through building.
//! No test depends on a real compiler: toolchains are pinned to paths that
//! do not exist, so builds fail the same way on every machine.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the geno binary command, isolated from the user's global config.
fn geno(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("geno").unwrap();
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("GENO_WORKSPACE")
        .env_remove("CC")
        .env_remove("CXX");
    cmd
}

/// Create a workspace `Game` in a fresh temporary directory.
fn workspace() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    geno(tmp.path())
        .args(["new", "Game"])
        .current_dir(tmp.path())
        .assert()
        .success();
    let root = tmp.path().join("Game");
    (tmp, root)
}

/// Pin a GCC toolchain that cannot be started.
fn pin_missing_gcc(home: &Path, root: &Path) {
    geno(home)
        .args(["toolchain", "override", "--kind", "gcc"])
        .args(["--cc", "/nonexistent/bin/gcc", "--cxx", "/nonexistent/bin/g++"])
        .current_dir(root)
        .assert()
        .success();
}

// ============================================================================
// geno new
// ============================================================================

#[test]
fn test_new_creates_workspace_document() {
    let (_tmp, root) = workspace();

    let text = fs::read_to_string(root.join("Game.gwks")).unwrap();
    assert!(text.starts_with("Name: Game\n"));
}

#[test]
fn test_new_with_path() {
    let tmp = TempDir::new().unwrap();
    geno(tmp.path())
        .args(["new", "Tools", "--path", "ws/tools"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Created workspace `Tools`"));

    assert!(tmp.path().join("ws/tools/Tools.gwks").exists());
}

#[test]
fn test_new_fails_if_directory_not_empty() {
    let tmp = TempDir::new().unwrap();
    let existing = tmp.path().join("existing");
    fs::create_dir(&existing).unwrap();
    fs::write(existing.join("notes.txt"), "keep").unwrap();

    geno(tmp.path())
        .args(["new", "existing"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not empty"));
}

// ============================================================================
// geno project
// ============================================================================

#[test]
fn test_project_add_and_list() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["project", "add", "Engine", "--kind", "StaticLibrary"])
        .current_dir(&root)
        .assert()
        .success();
    geno(tmp.path())
        .args(["project", "add", "Game"])
        .current_dir(&root)
        .assert()
        .success();

    assert!(root.join("Engine/Engine.gprj").exists());
    let text = fs::read_to_string(root.join("Game.gwks")).unwrap();
    assert!(text.contains("Projects:\n\tEngine/Engine.gprj\n\tGame/Game.gprj\n"));

    geno(tmp.path())
        .args(["project", "list"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Engine (StaticLibrary, 0 file(s))"))
        .stdout(predicate::str::contains("Game (Application, 0 file(s))"));
}

#[test]
fn test_project_add_rejects_duplicates() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["project", "add", "Engine"])
        .current_dir(&root)
        .assert()
        .success();
    geno(tmp.path())
        .args(["project", "add", "Engine"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_project_add_rejects_unknown_kind() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["project", "add", "Engine", "--kind", "Executable"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Executable"));
}

#[test]
fn test_project_files_globs_and_literals() {
    let (tmp, root) = workspace();
    geno(tmp.path())
        .args(["project", "add", "Game"])
        .current_dir(&root)
        .assert()
        .success();

    let src = root.join("Game/src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("main.c"), "int main(void) { return 0; }\n").unwrap();
    fs::write(src.join("world.cpp"), "void world() {}\n").unwrap();

    geno(tmp.path())
        .args(["project", "files", "Game", "src/*.c", "src/*.cpp", "gen/later.c"])
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("Added 3 file(s)"));

    let text = fs::read_to_string(root.join("Game/Game.gprj")).unwrap();
    assert!(text.contains("\tsrc/main.c\n"));
    assert!(text.contains("\tsrc/world.cpp\n"));
    assert!(text.contains("\tgen/later.c\n"));
}

#[test]
fn test_project_files_unknown_project() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["project", "files", "Ghost", "main.c"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no project named `Ghost`"))
        .stderr(predicate::str::contains("geno project list"));
}

#[test]
fn test_commands_outside_workspace_fail() {
    let tmp = TempDir::new().unwrap();

    geno(tmp.path())
        .args(["project", "list"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no workspace found"));
}

#[test]
fn test_workspace_flag() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["project", "add", "Engine"])
        .arg("--workspace")
        .arg(&root)
        .current_dir(tmp.path())
        .assert()
        .success();

    assert!(root.join("Engine/Engine.gprj").exists());
}

// ============================================================================
// geno build
// ============================================================================

#[test]
fn test_build_empty_workspace_succeeds() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .arg("build")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("Finished 0 project(s)"));
}

#[test]
fn test_build_json_reports_finished_event() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["build", "--message-format", "json"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""reason":"build-finished""#))
        .stdout(predicate::str::contains(r#""success":true"#));
}

#[test]
fn test_build_without_toolchain_fails() {
    let (tmp, root) = workspace();
    pin_missing_gcc(tmp.path(), &root);
    geno(tmp.path())
        .args(["project", "add", "Game"])
        .current_dir(&root)
        .assert()
        .success();
    geno(tmp.path())
        .args(["project", "files", "Game", "main.c"])
        .current_dir(&root)
        .assert()
        .success();

    geno(tmp.path())
        .args(["build", "--message-format", "json"])
        .current_dir(&root)
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""reason":"project-started""#))
        .stdout(predicate::str::contains(r#""reason":"compiler-error""#))
        .stdout(predicate::str::contains(r#""success":false"#))
        .stderr(predicate::str::contains("could not build project `Game`"));
}

#[test]
fn test_build_rejects_unknown_selection() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["build", "--select", "Platform=x86"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Platform"));
}

// ============================================================================
// geno matrix
// ============================================================================

#[test]
fn test_matrix_lists_combinations() {
    let (tmp, root) = workspace();
    let document = "Name: Game\n\
                    Projects:\n\
                    Matrix:\n\
                    \tPlatform:\n\
                    \t\tx86:\n\
                    \t\t\tArchitecture: x86\n\
                    \t\tx64:\n\
                    \t\t\tArchitecture: x86_64\n\
                    \tConfig:\n\
                    \t\tDebug:\n\
                    \t\t\tDefines:\n\
                    \t\t\t\tDEBUG\n\
                    \t\tRelease\n";
    fs::write(root.join("Game.gwks"), document).unwrap();

    geno(tmp.path())
        .arg("matrix")
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Platform: x86, x64"))
        .stdout(predicate::str::contains("Platform=x64 Config=Release"));
}

#[test]
fn test_matrix_empty() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .arg("matrix")
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("No build matrix"));
}

// ============================================================================
// geno flags
// ============================================================================

#[test]
fn test_flags_shows_compile_command() {
    let (tmp, root) = workspace();
    pin_missing_gcc(tmp.path(), &root);
    geno(tmp.path())
        .args(["project", "add", "Game"])
        .current_dir(&root)
        .assert()
        .success();

    geno(tmp.path())
        .args(["flags", "Game", "src/main.cpp", "--link"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("/nonexistent/bin/g++"))
        .stdout(predicate::str::contains("-std=c++20"))
        .stdout(predicate::str::contains("# Link `Game`"));
}

#[test]
fn test_flags_unknown_project() {
    let (tmp, root) = workspace();
    pin_missing_gcc(tmp.path(), &root);

    geno(tmp.path())
        .args(["flags", "Ghost", "main.c"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no project named `Ghost`"));
}

// ============================================================================
// geno toolchain
// ============================================================================

#[test]
fn test_toolchain_override_preserves_config() {
    let (tmp, root) = workspace();
    let config = root.join(".geno/config.toml");
    fs::create_dir_all(config.parent().unwrap()).unwrap();
    fs::write(&config, "# build knobs\n[build]\njobs = 4\n").unwrap();

    pin_missing_gcc(tmp.path(), &root);

    let text = fs::read_to_string(&config).unwrap();
    assert!(text.contains("# build knobs"));
    assert!(text.contains("jobs = 4"));
    assert!(text.contains("kind = \"gcc\""));
    assert!(text.contains("cc = \"/nonexistent/bin/gcc\""));

    geno(tmp.path())
        .args(["toolchain", "show"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Kind:     gcc"))
        .stdout(predicate::str::contains("/nonexistent/bin/gcc"));

    geno(tmp.path())
        .args(["toolchain", "override", "--clear"])
        .current_dir(&root)
        .assert()
        .success();
    let text = fs::read_to_string(&config).unwrap();
    assert!(!text.contains("[toolchain]"));
    assert!(text.contains("jobs = 4"));
}

#[test]
fn test_toolchain_override_requires_a_setting() {
    let (tmp, root) = workspace();

    geno(tmp.path())
        .args(["toolchain", "override"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to override"));
}

// ============================================================================
// geno completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();

    geno(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("geno"));
}
