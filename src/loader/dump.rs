//! Writing woven source and interface stubs to disk.

use super::cache::Woven;
use crate::ast::unparse::{signature, unparse_expr, unparse_module};
use crate::ast::{Module, StmtKind};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Tempfile in the target directory, fsync, rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `dir/pkg_mod.py` for module `pkg.mod`.
pub fn dump_path(dir: &Path, module_name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{extension}", module_name.replace('.', "_")))
}

/// Write the woven source of `module_name` under `dir`.
pub fn dump_module(dir: &Path, module_name: &str, module: &Module) -> io::Result<PathBuf> {
    let path = dump_path(dir, module_name, "py");
    atomic_write(&path, unparse_module(module).as_bytes())?;
    tracing::debug!(module = module_name, path = %path.display(), "woven source dumped");
    Ok(path)
}

/// Signatures of a woven module with the points woven into it.
pub fn interface_stub(module_name: &str, woven: &Woven) -> String {
    let mut out = format!("# Interface of {module_name}\n");
    let points: Vec<_> = woven.report.points.iter().filter(|p| p.matched() > 0).collect();
    if !points.is_empty() {
        out.push_str("#\n# Woven points:\n");
        for p in points {
            let lines: Vec<String> = p.lines.iter().map(usize::to_string).collect();
            out.push_str(&format!(
                "#   {}.{}  {}  lines {}  ({} callback(s))\n",
                p.target,
                p.method,
                p.descriptor,
                lines.join(","),
                p.callbacks
            ));
        }
    }

    for stmt in &woven.module.body {
        match &stmt.kind {
            StmtKind::FunctionDef(func) => {
                out.push_str(&format!("\n{}: ...\n", signature(func)));
            }
            StmtKind::ClassDef(class) => {
                let bases: Vec<String> = class.bases.iter().map(unparse_expr).collect();
                if bases.is_empty() {
                    out.push_str(&format!("\nclass {}:\n", class.name));
                } else {
                    out.push_str(&format!("\nclass {}({}):\n", class.name, bases.join(", ")));
                }
                let mut methods = class.methods().peekable();
                if methods.peek().is_none() {
                    out.push_str("    ...\n");
                }
                for method in methods {
                    out.push_str(&format!("    {}: ...\n", signature(method)));
                }
            }
            _ => {}
        }
    }
    out
}
