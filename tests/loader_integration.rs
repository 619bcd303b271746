//! Loader behaviour over real source trees.

use mixweave::api::*;
use mixweave::loader::{dump_path, ModuleLoader};
use mixweave::{Manifest, WeaveConfig};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PLAYER: &str = include_str!("fixtures/game/player.py");
const PATCHES: &str = include_str!("fixtures/patches.toml");

fn tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let game = dir.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("__init__.py"), "").unwrap();
    fs::write(game.join("player.py"), PLAYER).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a module").unwrap();
    dir
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    Manifest::load_from_str(PATCHES).unwrap().apply(&mut registry).unwrap();
    registry.freeze();
    registry
}

#[test]
fn source_trees_are_named_by_package_path() {
    let dir = tree();
    let mut loader = ModuleLoader::new(registry(), WeaveConfig::default());
    let names = loader.add_tree(dir.path()).unwrap();
    assert_eq!(names, vec!["game".to_string(), "game.player".to_string()]);

    let woven = loader.weave("game.player").unwrap();
    assert!(woven.report.is_woven());
    assert_eq!(woven.report.total_matches(), 3);

    let package = loader.weave("game").unwrap();
    assert!(!package.report.is_woven());
}

#[test]
fn debug_mode_dumps_woven_modules() {
    let dir = tree();
    let dumps = TempDir::new().unwrap();
    let config = WeaveConfig {
        debug: true,
        dump_dir: dumps.path().join("weaved"),
        ..WeaveConfig::default()
    };
    let mut loader = ModuleLoader::new(registry(), config);
    loader.add_tree(dir.path()).unwrap();
    loader.load("game.player").unwrap();

    let dumped = dump_path(&dumps.path().join("weaved"), "game.player", "py");
    assert_eq!(dumped.file_name().and_then(|n| n.to_str()), Some("game_player.py"));
    let text = fs::read_to_string(&dumped).unwrap();
    assert!(text.contains("def set_health"));
    assert!(text.contains("__weave__.value("));
    assert!(text.contains("__weave__.invoke("));
}

#[test]
fn interface_stubs_describe_loaded_modules() {
    let dir = tree();
    let stubs = TempDir::new().unwrap();
    let mut loader = ModuleLoader::new(registry(), WeaveConfig::default());
    loader.add_tree(dir.path()).unwrap();
    loader.load("game.player").unwrap();

    let written = loader.generate_interface_stubs(stubs.path()).unwrap();
    assert_eq!(written, vec![stubs.path().join("game_player.pyi")]);
    let stub = fs::read_to_string(&written[0]).unwrap();
    assert!(stub.starts_with("# Interface of game.player"));
    assert!(stub.contains("class Player:"));
    assert!(stub.contains("    def set_health(self, value) -> int: ..."));
    assert!(stub.contains("def make_player(health=100): ..."));
}

#[test]
fn reload_picks_up_edited_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("counter.py");
    fs::write(&path, "def base():\n    return 1.0\n\nvalue = base()\n").unwrap();

    let mut registry = Registry::new();
    registry
        .group("boost", "counter")
        .add(Injection::new(
            "base",
            at_constant(2.0),
            Callback::sync(|_, info, _, _| {
                info.set_value(20.0);
                Ok(())
            }),
        ))
        .register()
        .unwrap();
    let mut loader = ModuleLoader::new(registry, WeaveConfig::default());
    loader.add_file("counter", &path).unwrap();

    let first = loader.load("counter").unwrap();
    assert_eq!(first.get_global("value").and_then(|v| v.as_float()), Some(1.0));

    rewrite(&path, "def base():\n    return 2.0\n\nvalue = base()\n");
    let second = loader.reload("counter").unwrap();
    assert_eq!(second.get_global("value").and_then(|v| v.as_float()), Some(20.0));
    assert_eq!(loader.cache_stats().misses, 2);
}

fn rewrite(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}
